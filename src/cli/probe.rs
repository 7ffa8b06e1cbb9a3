use std::time::Duration;

use morat::control::StopSignal;
use morat::decision;
use morat::platform::Telemetry;
use morat::sampler::{self, Sample};

const PROBE_WINDOW: Duration = Duration::from_secs(1);

fn opt<T: std::fmt::Display>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

// ONE LINE PER WINDOW:
// cores=4 irq=[310 42 7 0] batt=38C cap=87% core=61C util=23%
fn format_line<T: Telemetry + ?Sized>(
    platform: &T,
    current: &Sample,
    previous: Option<&Sample>,
    util: Option<u32>,
) -> String {
    let deltas = match previous {
        Some(p) => decision::core_deltas(&current.per_core_counter, &p.per_core_counter)
            .iter()
            .map(|(_, d)| d.to_string())
            .collect::<Vec<_>>()
            .join(" "),
        None => "-".to_string(),
    };
    format!(
        "cores={} irq=[{}] batt={}C cap={}% core={}C util={}%",
        current.per_core_counter.len(),
        deltas,
        opt(platform.read_battery_temperature()),
        opt(platform.read_battery_capacity_pct()),
        opt(platform.read_peak_core_temperature()),
        opt(util),
    )
}

pub fn run_probe<T: Telemetry + ?Sized>(platform: &T, stop: &StopSignal) {
    let mut previous: Option<Sample> = None;

    while !stop.is_stopped() {
        // THE UTILIZATION WINDOW DOUBLES AS THE SAMPLE PERIOD
        let util = sampler::measure_utilization(platform, PROBE_WINDOW, stop);
        if stop.is_stopped() {
            break;
        }
        if util.is_none() && stop.wait_timeout(PROBE_WINDOW) {
            break;
        }

        let current = match sampler::sample_irqs(platform) {
            Ok(s) => s,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        println!("{}", format_line(platform, &current, previous.as_ref(), util));
        previous = Some(current);
    }
}
