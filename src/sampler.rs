// MORAT METRIC SAMPLER
// POINT-IN-TIME AND WINDOWED READINGS. COUNTERS STAY CUMULATIVE HERE;
// DELTAS BELONG TO THE DECISION ENGINE.

use std::time::{Duration, Instant};

use crate::control::StopSignal;
use crate::error::{Error, Result};
use crate::platform::{CoreId, CpuTimes, IrqLine, Telemetry};

#[derive(Clone, Debug)]
pub struct Sample {
    pub per_core_counter: Vec<(CoreId, u64)>,
    pub irq_lines: Vec<IrqLine>,
    pub temperature_c: Option<i32>,
    pub utilization_pct: Option<u32>,
    pub timestamp: Instant,
}

impl Sample {
    pub fn empty(timestamp: Instant) -> Self {
        Self {
            per_core_counter: Vec::new(),
            irq_lines: Vec::new(),
            temperature_c: None,
            utilization_pct: None,
            timestamp,
        }
    }
}

// SUM EVERY LINE (ROUTABLE OR NOT) INTO ONE CUMULATIVE TOTAL PER ONLINE CORE
pub fn per_core_totals(lines: &[IrqLine], online: &[CoreId]) -> Vec<(CoreId, u64)> {
    online
        .iter()
        .map(|&core| {
            let total = lines
                .iter()
                .fold(0u64, |acc, line| acc.saturating_add(line.count_on(core)));
            (core, total)
        })
        .collect()
}

// BUSY% = (DTOTAL - DIDLE) * 100 / DTOTAL. DTOTAL == 0 -> 0.
pub fn busy_pct(start: CpuTimes, end: CpuTimes) -> u32 {
    let d_total = end.total.saturating_sub(start.total);
    if d_total == 0 {
        return 0;
    }
    let d_idle = end.idle.saturating_sub(start.idle).min(d_total);
    ((d_total - d_idle) as u128 * 100 / d_total as u128) as u32
}

pub fn sample_irqs<T: Telemetry + ?Sized>(platform: &T) -> Result<Sample> {
    let online = platform.enumerate_online_cores();
    if online.is_empty() {
        return Err(Error::SampleUnavailable("online cores"));
    }
    let lines = platform
        .read_irq_lines()
        .ok_or(Error::SampleUnavailable("irq counters"))?;

    let mut sample = Sample::empty(Instant::now());
    sample.per_core_counter = per_core_totals(&lines, &online);
    sample.irq_lines = lines;
    Ok(sample)
}

pub fn sample_battery<T: Telemetry + ?Sized>(platform: &T) -> Sample {
    let mut sample = Sample::empty(Instant::now());
    sample.temperature_c = platform.read_battery_temperature();
    sample
}

// TWO COUNTER READS `window` APART. None IF EITHER READ FAILS OR STOP ARRIVES
// DURING THE WINDOW (AN INTERRUPTED WINDOW IS NOT A MEASUREMENT).
pub fn measure_utilization<T: Telemetry + ?Sized>(
    platform: &T,
    window: Duration,
    stop: &StopSignal,
) -> Option<u32> {
    let start = platform.read_cpu_time_counters()?;
    if stop.wait_timeout(window) {
        return None;
    }
    let end = platform.read_cpu_time_counters()?;
    Some(busy_pct(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(irq: Option<u32>, counts: &[(CoreId, u64)]) -> IrqLine {
        IrqLine {
            irq,
            name: String::new(),
            per_core: counts.to_vec(),
        }
    }

    #[test]
    fn busy_pct_zero_window() {
        let t = CpuTimes::from_busy_idle(500, 500);
        assert_eq!(busy_pct(t, t), 0);
    }

    #[test]
    fn busy_pct_typical() {
        let start = CpuTimes::from_busy_idle(1_000, 9_000);
        let end = CpuTimes::from_busy_idle(1_300, 9_700); // DTOTAL 1000, DIDLE 700
        assert_eq!(busy_pct(start, end), 30);
    }

    #[test]
    fn busy_pct_counter_went_backwards() {
        let start = CpuTimes::from_busy_idle(1_000, 9_000);
        let end = CpuTimes::from_busy_idle(10, 10);
        assert_eq!(busy_pct(start, end), 0);
    }

    #[test]
    fn busy_pct_idle_larger_than_total_clamped() {
        let start = CpuTimes { busy: 0, idle: 0, total: 100 };
        let end = CpuTimes { busy: 0, idle: 500, total: 200 };
        assert_eq!(busy_pct(start, end), 0);
    }

    #[test]
    fn busy_pct_fully_busy() {
        let start = CpuTimes::from_busy_idle(0, 0);
        let end = CpuTimes::from_busy_idle(400, 0);
        assert_eq!(busy_pct(start, end), 100);
    }

    #[test]
    fn totals_include_unroutable_rows() {
        let lines = vec![
            line(Some(30), &[(0, 10), (1, 5)]),
            line(None, &[(0, 1), (1, 100)]), // LOC-STYLE ROW
        ];
        assert_eq!(per_core_totals(&lines, &[0, 1]), vec![(0, 11), (1, 105)]);
    }

    #[test]
    fn totals_zero_for_core_missing_from_table() {
        let lines = vec![line(Some(30), &[(0, 10)])];
        assert_eq!(per_core_totals(&lines, &[0, 3]), vec![(0, 10), (3, 0)]);
    }
}
