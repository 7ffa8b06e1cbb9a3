// MORAT AFFINITY PINNER
// KEEPS LATENCY-INSENSITIVE SYSTEM SERVICES (COMPOSITOR, AUDIO, MEDIA) ON THE
// LITTLE CLUSTER. THE LITTLE SET IS RECOMPUTED EVERY CYCLE FROM CURRENT
// FREQUENCY READINGS, SO A HOTPLUGGED CORE IS PICKED UP ON THE NEXT PASS.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::actuator::{self, Outcome};
use crate::config::AffinityConfig;
use crate::control::{Domain, StopSignal};
use crate::decision::{Action, Decision, Subject};
use crate::error::Result;
use crate::event::SharedLog;
use crate::guard;
use crate::platform::Platform;
use crate::topology::{ClassifyRule, Topology};

pub const NAME: &str = "pinner";

pub struct Pinner<P: Platform + ?Sized> {
    platform: Arc<P>,
    cfg: AffinityConfig,
    log: SharedLog,
}

impl<P: Platform + ?Sized> Pinner<P> {
    pub fn new(platform: Arc<P>, cfg: AffinityConfig, log: SharedLog) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { platform, cfg, log })
    }

    pub fn step(&mut self, stop: &StopSignal) -> Outcome {
        let mut outcome = Outcome::default();

        let topology = Topology::read(
            &*self.platform,
            ClassifyRule::Tolerance {
                band_khz: self.cfg.little_tolerance_khz,
            },
        );
        let little = topology.little_cores();
        if little.is_empty() {
            info!("{}: no little cores found, skipping", NAME);
            return outcome;
        }

        for process in self.platform.enumerate_processes() {
            if !guard::is_pin_target(&process.name, &self.cfg.targets) {
                continue;
            }
            if stop.is_stopped() {
                break;
            }
            let pin = Decision::Actuate {
                subject: Subject::Process {
                    pid: process.pid,
                    name: process.name,
                },
                action: Action::SetAffinity {
                    cores: little.clone(),
                },
            };
            let o = actuator::dispatch(&*self.platform, NAME, &pin, &self.log);
            outcome.attempted += o.attempted;
            outcome.failed += o.failed;
        }

        debug!(
            "{}: {} pinned to cpus {} ({} failed)",
            NAME,
            outcome.attempted,
            actuator::format_cores(&little),
            outcome.failed
        );
        outcome
    }
}

impl<P: Platform + ?Sized + 'static> Domain for Pinner<P> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn interval(&self) -> Duration {
        self.cfg.interval
    }

    fn cycle(&mut self, stop: &StopSignal) -> Result<()> {
        self.step(stop);
        Ok(())
    }
}
