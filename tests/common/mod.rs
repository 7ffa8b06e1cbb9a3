// IN-MEMORY PLATFORM FOR THE INTEGRATION TESTS.
// EVERY READ COMES FROM A MUTABLE SNAPSHOT, EVERY WRITE IS RECORDED,
// AND INDIVIDUAL CONTROL POINTS CAN BE MADE TO FAIL.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use morat::error::{Error, Result};
use morat::platform::{ControlPoints, CoreId, CpuTimes, IrqLine, ProcessInfo, Telemetry};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    Ceiling(CoreId, u32),
    ProcessAffinity(i32, Vec<CoreId>),
    IrqAffinity(u32, Vec<CoreId>),
    DropCaches(u8),
}

#[derive(Default)]
pub struct FakeState {
    pub cores: Vec<CoreId>,
    pub irq_lines: Option<Vec<IrqLine>>,
    pub battery_temp: Option<i32>,
    pub battery_capacity: Option<u32>,
    pub peak_temp: Option<i32>,
    // CONSUMED FRONT TO BACK; THE LAST ENTRY REPEATS
    pub cpu_times: VecDeque<CpuTimes>,
    pub max_freq: HashMap<CoreId, u32>,
    pub ceiling: HashMap<CoreId, u32>,
    pub processes: Vec<ProcessInfo>,
    pub uptime: Option<Duration>,
    pub fail_ceiling: Vec<CoreId>,
    pub fail_pids: Vec<i32>,
    pub fail_irqs: Vec<u32>,
    pub writes: Vec<Write>,
}

#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new(cores: u32) -> Arc<Self> {
        let fake = Self::default();
        fake.state().cores = (0..cores).collect();
        Arc::new(fake)
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    pub fn set_irqs(&self, lines: Vec<IrqLine>) {
        self.state().irq_lines = Some(lines);
    }

    pub fn set_freqs(&self, max_khz: &[u32]) {
        let mut s = self.state();
        for (core, &khz) in max_khz.iter().enumerate() {
            s.max_freq.insert(core as CoreId, khz);
        }
    }

    pub fn set_ceilings(&self, khz: &[u32]) {
        let mut s = self.state();
        for (core, &v) in khz.iter().enumerate() {
            s.ceiling.insert(core as CoreId, v);
        }
    }

    // TWO COUNTER READS THAT YIELD `busy_pct` OVER ONE WINDOW
    pub fn set_load(&self, busy_pct: u64) {
        let mut s = self.state();
        s.cpu_times = VecDeque::from(vec![
            CpuTimes::from_busy_idle(0, 0),
            CpuTimes::from_busy_idle(busy_pct, 100 - busy_pct),
        ]);
    }

    pub fn add_process(&self, pid: i32, name: &str, uid: u32, has_memory_map: bool) {
        self.state().processes.push(ProcessInfo {
            pid,
            name: name.to_string(),
            owner_uid: uid,
            has_memory_map,
        });
    }

    fn rejected(target: String) -> Error {
        Error::actuation(target, io::Error::new(io::ErrorKind::PermissionDenied, "rejected"))
    }
}

// ONE ROUTABLE LINE WITH COUNTS FOR CORES 0..N
pub fn line(irq: u32, name: &str, counts: &[u64]) -> IrqLine {
    IrqLine {
        irq: Some(irq),
        name: name.to_string(),
        per_core: counts.iter().enumerate().map(|(c, &n)| (c as CoreId, n)).collect(),
    }
}

impl Telemetry for FakePlatform {
    fn enumerate_online_cores(&self) -> Vec<CoreId> {
        self.state().cores.clone()
    }

    fn read_irq_lines(&self) -> Option<Vec<IrqLine>> {
        self.state().irq_lines.clone()
    }

    fn read_battery_temperature(&self) -> Option<i32> {
        self.state().battery_temp
    }

    fn read_battery_capacity_pct(&self) -> Option<u32> {
        self.state().battery_capacity
    }

    fn read_peak_core_temperature(&self) -> Option<i32> {
        self.state().peak_temp
    }

    fn read_cpu_time_counters(&self) -> Option<CpuTimes> {
        let mut s = self.state();
        if s.cpu_times.len() > 1 {
            s.cpu_times.pop_front()
        } else {
            s.cpu_times.front().copied()
        }
    }

    fn read_core_max_frequency(&self, core: CoreId) -> Option<u32> {
        self.state().max_freq.get(&core).copied()
    }

    fn read_core_current_ceiling(&self, core: CoreId) -> Option<u32> {
        self.state().ceiling.get(&core).copied()
    }

    fn enumerate_processes(&self) -> Vec<ProcessInfo> {
        self.state().processes.clone()
    }

    fn read_uptime(&self) -> Option<Duration> {
        self.state().uptime
    }
}

impl ControlPoints for FakePlatform {
    fn write_core_ceiling(&self, core: CoreId, khz: u32) -> Result<()> {
        let mut s = self.state();
        if s.fail_ceiling.contains(&core) {
            return Err(Self::rejected(format!("cpu{}", core)));
        }
        s.ceiling.insert(core, khz);
        s.writes.push(Write::Ceiling(core, khz));
        Ok(())
    }

    fn set_process_affinity(&self, pid: i32, cores: &[CoreId]) -> Result<()> {
        let mut s = self.state();
        if s.fail_pids.contains(&pid) {
            return Err(Self::rejected(format!("pid {}", pid)));
        }
        s.writes.push(Write::ProcessAffinity(pid, cores.to_vec()));
        Ok(())
    }

    fn set_irq_affinity(&self, irq: u32, cores: &[CoreId]) -> Result<()> {
        let mut s = self.state();
        if s.fail_irqs.contains(&irq) {
            return Err(Self::rejected(format!("irq {}", irq)));
        }
        s.writes.push(Write::IrqAffinity(irq, cores.to_vec()));
        Ok(())
    }

    fn drop_caches(&self, level: u8) -> Result<()> {
        self.state().writes.push(Write::DropCaches(level));
        Ok(())
    }
}
