// MORAT PLATFORM COLLABORATORS
// EVERY READ AND WRITE THE CONTROL LOOPS PERFORM GOES THROUGH THESE TRAITS.
// THE LINUX BACKEND LIVES IN sysfs.rs, TESTS USE AN IN-MEMORY FAKE.
//
// READS ARE SNAPSHOT READS: A MISSING OR UNPARSABLE VALUE COMES BACK AS None,
// NEVER AS A PANIC. WRITES RETURN Error::ActuationFailed ON REJECTION.

use std::time::{Duration, Instant};

use crate::error::Result;

pub type CoreId = u32;

// ONE ROW OF THE INTERRUPT TABLE. CUMULATIVE COUNTS SINCE BOOT, PER ONLINE CORE.
// irq IS None FOR ARCHITECTURE ROWS (NMI, LOC, RES ...) WHICH CANNOT BE ROUTED.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrqLine {
    pub irq: Option<u32>,
    pub name: String,
    pub per_core: Vec<(CoreId, u64)>,
}

impl IrqLine {
    pub fn count_on(&self, core: CoreId) -> u64 {
        self.per_core
            .iter()
            .find(|(c, _)| *c == core)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

// CUMULATIVE CPU TIME SINCE BOOT (CLOCK TICKS). busy + idle == total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub busy: u64,
    pub idle: u64,
    pub total: u64,
}

impl CpuTimes {
    pub fn from_busy_idle(busy: u64, idle: u64) -> Self {
        Self {
            busy,
            idle,
            total: busy.saturating_add(idle),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: i32,
    pub name: String,
    pub owner_uid: u32,
    pub has_memory_map: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScreenState {
    On,
    Off,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenEvent {
    pub state: ScreenState,
    pub at: Instant,
}

pub trait Telemetry: Send + Sync {
    fn enumerate_online_cores(&self) -> Vec<CoreId>;
    fn read_irq_lines(&self) -> Option<Vec<IrqLine>>;
    fn read_battery_temperature(&self) -> Option<i32>;
    fn read_battery_capacity_pct(&self) -> Option<u32>;
    fn read_peak_core_temperature(&self) -> Option<i32>;
    fn read_cpu_time_counters(&self) -> Option<CpuTimes>;
    fn read_core_max_frequency(&self, core: CoreId) -> Option<u32>;
    fn read_core_current_ceiling(&self, core: CoreId) -> Option<u32>;
    fn enumerate_processes(&self) -> Vec<ProcessInfo>;
    fn read_uptime(&self) -> Option<Duration>;

    // EVERY LINE SUMMED FOR ONE CORE
    fn read_cumulative_irq_counts(&self, core: CoreId) -> Option<u64> {
        let lines = self.read_irq_lines()?;
        Some(lines.iter().map(|l| l.count_on(core)).fold(0u64, u64::saturating_add))
    }
}

pub trait ControlPoints: Send + Sync {
    fn write_core_ceiling(&self, core: CoreId, khz: u32) -> Result<()>;
    fn set_process_affinity(&self, pid: i32, cores: &[CoreId]) -> Result<()>;
    fn set_irq_affinity(&self, irq: u32, cores: &[CoreId]) -> Result<()>;
    fn drop_caches(&self, level: u8) -> Result<()>;
}

pub trait Platform: Telemetry + ControlPoints {}

impl<T: Telemetry + ControlPoints + ?Sized> Platform for T {}

pub type ScreenCallback = Box<dyn Fn(ScreenEvent) + Send + Sync>;

pub trait ScreenListener: Send + Sync {
    fn register_screen_state_listener(&self, callback: ScreenCallback);
}
