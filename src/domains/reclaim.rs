// MORAT CACHE RECLAIMER
// LONG-RUNNING DEVICE, SCREEN OFF FOR A WHILE: DROP PAGE CACHE, DENTRIES
// AND INODES. REPEATS EVERY CYCLE FOR AS LONG AS BOTH CONDITIONS HOLD.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::actuator::{self, Outcome};
use crate::config::ReclaimConfig;
use crate::control::{Domain, StopSignal};
use crate::decision::{self, Action, Decision, Subject};
use crate::error::Result;
use crate::event::SharedLog;
use crate::platform::Platform;
use crate::screen::ScreenCell;

pub const NAME: &str = "reclaimer";

pub struct Reclaimer<P: Platform + ?Sized> {
    platform: Arc<P>,
    cfg: ReclaimConfig,
    screen: ScreenCell,
    log: SharedLog,
}

impl<P: Platform + ?Sized> Reclaimer<P> {
    pub fn new(platform: Arc<P>, cfg: ReclaimConfig, screen: ScreenCell, log: SharedLog) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            platform,
            cfg,
            screen,
            log,
        })
    }

    pub fn step(&mut self, stop: &StopSignal) -> Outcome {
        let uptime = self.platform.read_uptime();
        let screen = self.screen.get();
        if !decision::reclaim_due(uptime, screen, Instant::now(), &self.cfg) {
            debug!("{}: not due (uptime {:?}, screen {:?})", NAME, uptime, screen.map(|e| e.state));
            return Outcome::default();
        }
        if stop.is_stopped() {
            return Outcome::default();
        }

        let reclaim = Decision::Actuate {
            subject: Subject::System,
            action: Action::DropCaches {
                level: self.cfg.drop_level,
            },
        };
        let outcome = actuator::dispatch(&*self.platform, NAME, &reclaim, &self.log);
        if outcome.failed == 0 {
            info!("{}: dropped caches (level {})", NAME, self.cfg.drop_level);
        }
        outcome
    }
}

impl<P: Platform + ?Sized + 'static> Domain for Reclaimer<P> {
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
