// MORAT APP BOOSTER
// USER-INSTALLED APPS GET PINNED TO THE BIG CORE. A PER-PID COOLDOWN IN A
// BOUNDED RECENCY CACHE KEEPS THE 300MS LOOP FROM RE-ISSUING THE SAME AFFINITY
// CALL FOR A PROCESS IT JUST HANDLED. IF THE BIG CORE GOES OFFLINE THE
// BOOSTER VETOES ITSELF AND ITS LOOP ENDS.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::actuator::{self, Outcome};
use crate::config::BoostConfig;
use crate::control::{Domain, StopSignal};
use crate::decision::{Action, Decision, Subject};
use crate::error::{Error, Result};
use crate::event::SharedLog;
use crate::guard;
use crate::platform::{CoreId, Platform};
use crate::recency::RecencyCache;
use crate::topology::{ClassifyRule, Topology};

pub const NAME: &str = "booster";

pub struct Booster<P: Platform + ?Sized> {
    platform: Arc<P>,
    cfg: BoostConfig,
    big_core: CoreId,
    recent: RecencyCache<i32>,
    log: SharedLog,
}

impl<P: Platform + ?Sized> Booster<P> {
    // FAILS WITH ConfigInvalid WHEN NO CORE CLEARS THE BIG-CORE CUTOFF
    pub fn new(platform: Arc<P>, cfg: BoostConfig, log: SharedLog) -> Result<Self> {
        cfg.validate()?;
        let topology = Topology::read(
            &*platform,
            ClassifyRule::Cutoff {
                big_above_khz: cfg.big_core_cutoff_khz,
            },
        );
        let big_core = topology.first_big().ok_or_else(|| {
            Error::invalid(format!(
                "no online core above {} kHz, app boost disabled",
                cfg.big_core_cutoff_khz
            ))
        })?;
        info!("{}: big core is cpu{}", NAME, big_core);

        Ok(Self {
            platform,
            recent: RecencyCache::with_capacity(cfg.capacity),
            cfg,
            big_core,
            log,
        })
    }

    pub fn big_core(&self) -> CoreId {
        self.big_core
    }

    pub fn tracked(&self) -> usize {
        self.recent.len()
    }

    pub fn step(&mut self, stop: &StopSignal) -> Result<Outcome> {
        if !self.platform.enumerate_online_cores().contains(&self.big_core) {
            return Err(Error::veto(format!("big core cpu{} went offline", self.big_core)));
        }

        let mut outcome = Outcome::default();
        let mut suppressed = 0usize;

        for process in self.platform.enumerate_processes() {
            if !guard::is_boost_candidate(&process, self.cfg.app_uid_start) {
                continue;
            }
            if self.recent.check_and_mark(process.pid, Instant::now(), self.cfg.cooldown) {
                suppressed += 1;
                continue;
            }
            if stop.is_stopped() {
                break;
            }
            let boost = Decision::Actuate {
                subject: Subject::Process {
                    pid: process.pid,
                    name: process.name,
                },
                action: Action::SetAffinity {
                    cores: vec![self.big_core],
                },
            };
            let o = actuator::dispatch(&*self.platform, NAME, &boost, &self.log);
            outcome.attempted += o.attempted;
            outcome.failed += o.failed;
        }

        if outcome.attempted > 0 {
            debug!(
                "{}: boosted {} to cpu{} ({} on cooldown, {} tracked)",
                NAME,
                outcome.attempted,
                self.big_core,
                suppressed,
                self.recent.len()
            );
        }
        Ok(outcome)
    }
}

impl<P: Platform + ?Sized + 'static> Domain for Booster<P> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn interval(&self) -> Duration {
        self.cfg.interval
    }

    fn cycle(&mut self, stop: &StopSignal) -> Result<()> {
        self.step(stop).map(|_| ())
    }

    fn run_immediately(&self) -> bool {
        true
    }
}
