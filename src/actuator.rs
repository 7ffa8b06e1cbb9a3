// MORAT ACTUATOR DISPATCH
// APPROVED DECISION -> CONCRETE CONTROL-POINT WRITES.
// FIRE-AND-FORGET: A FAILED WRITE IS LOGGED AND RECORDED, NEVER RETRIED HERE,
// AND NEVER STOPS THE REMAINING WRITES OF THE SAME DECISION.

use log::{debug, warn};

use crate::decision::{self, Action, Decision, Subject};
use crate::error::Result;
use crate::event::{self, SharedLog};
use crate::platform::{CoreId, Platform};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub attempted: usize,
    pub failed: usize,
}

impl Outcome {
    fn note(&mut self, domain: &'static str, log: &SharedLog, subject: String, result: Result<()>) {
        self.attempted += 1;
        let ok = match result {
            Ok(()) => {
                debug!("{}: {}", domain, subject);
                true
            }
            Err(e) => {
                warn!("{}: {} failed: {}", domain, subject, e);
                self.failed += 1;
                false
            }
        };
        event::record(log, domain, subject, ok);
    }
}

pub fn format_cores(cores: &[CoreId]) -> String {
    cores
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn dispatch<P: Platform + ?Sized>(
    platform: &P,
    domain: &'static str,
    decision: &Decision,
    log: &SharedLog,
) -> Outcome {
    let mut outcome = Outcome::default();

    let (subject, action) = match decision {
        Decision::NoAction => return outcome,
        Decision::Actuate { subject, action } => (subject, action),
    };

    match action {
        Action::MigrateIrqs { to, lines } => {
            let from = match subject {
                Subject::Core(c) => format!("cpu{}", c),
                _ => "?".to_string(),
            };
            for line in lines {
                let what = format!("irq {} ({}) {} -> cpu{}", line.irq, line.name, from, to);
                outcome.note(domain, log, what, platform.set_irq_affinity(line.irq, &[*to]));
            }
        }
        Action::RaiseCeilings => {
            for core in platform.enumerate_online_cores() {
                let current = platform.read_core_current_ceiling(core);
                let hw_max = platform.read_core_max_frequency(core);
                if let Some(target) = decision::ceiling_target(current, hw_max) {
                    let what = format!("cpu{} ceiling {} -> {} kHz", core, current.unwrap_or(0), target);
                    outcome.note(domain, log, what, platform.write_core_ceiling(core, target));
                }
            }
        }
        Action::SetAffinity { cores } => {
            if let Subject::Process { pid, name } = subject {
                let what = format!("{} (pid {}) -> cpus {}", name, pid, format_cores(cores));
                outcome.note(domain, log, what, platform.set_process_affinity(*pid, cores));
            }
        }
        Action::DropCaches { level } => {
            let what = format!("drop_caches={}", level);
            outcome.note(domain, log, what, platform.drop_caches(*level));
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_cores_joins() {
        assert_eq!(format_cores(&[0, 1, 3]), "0,1,3");
        assert_eq!(format_cores(&[]), "");
    }
}
