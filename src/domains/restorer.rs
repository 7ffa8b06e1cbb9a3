// MORAT THERMAL RESTORER
// 30-SECOND LOOP. ONCE THE BATTERY HAS COOLED AND THE SYSTEM IS DOING REAL
// WORK, PUT EVERY CORE'S FREQUENCY CEILING BACK TO ITS HARDWARE MAXIMUM.
//
// HYSTERESIS: NEAR THE THRESHOLD THE COOLDOWN STRETCHES FROM SHORT TO LONG
// SO A BATTERY HOVERING AROUND THE LIMIT IS NOT BOUNCED EVERY POLL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::actuator::{self, Outcome};
use crate::config::RestorerConfig;
use crate::control::{Domain, StopSignal};
use crate::decision::{self, Action, Decision, DecisionState, RestoreVerdict, Subject};
use crate::error::Result;
use crate::event::SharedLog;
use crate::platform::Platform;
use crate::sampler;

pub const NAME: &str = "restorer";

pub struct Restorer<P: Platform + ?Sized> {
    platform: Arc<P>,
    cfg: RestorerConfig,
    state: DecisionState,
    log: SharedLog,
}

impl<P: Platform + ?Sized> Restorer<P> {
    pub fn new(platform: Arc<P>, cfg: RestorerConfig, log: SharedLog) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            platform,
            cfg,
            state: DecisionState::default(),
            log,
        })
    }

    pub fn state(&self) -> &DecisionState {
        &self.state
    }

    pub fn step(&mut self, stop: &StopSignal) -> (RestoreVerdict, Outcome) {
        let sample = sampler::sample_battery(&*self.platform);
        // A NEGATIVE BATTERY READING IS A SENSOR FAULT, NOT A TEMPERATURE
        let temp = sample.temperature_c.filter(|t| *t >= 0);

        let platform = &self.platform;
        let window = self.cfg.load_window;
        let verdict = decision::evaluate_restore(
            self.state.last_action_time,
            temp,
            Instant::now(),
            &self.cfg,
            || sampler::measure_utilization(&**platform, window, stop),
        );

        if let Some(mode) = verdict.mode {
            if mode != self.state.hysteresis_mode {
                debug!("{}: hysteresis {} -> {}", NAME, self.state.hysteresis_mode.label(), mode.label());
            }
            self.state.hysteresis_mode = mode;
        }
        self.state.previous_sample = Some(sample);

        if !verdict.should_restore() {
            debug!("{}: {:?} (temp {:?}C)", NAME, verdict.gate, temp);
            return (verdict, Outcome::default());
        }
        if stop.is_stopped() {
            return (verdict, Outcome::default());
        }

        let restore = Decision::Actuate {
            subject: Subject::AllCores,
            action: Action::RaiseCeilings,
        };
        let outcome = actuator::dispatch(&**platform, NAME, &restore, &self.log);
        // STAMPED EVEN IF SOME CORES FAILED; THE NEXT ATTEMPT WAITS OUT THE COOLDOWN
        self.state.last_action_time = Some(Instant::now());

        if outcome.attempted > 0 {
            info!(
                "{}: raised {} ceilings ({} failed), {:?}, mode {}",
                NAME,
                outcome.attempted - outcome.failed,
                outcome.failed,
                verdict.gate,
                self.state.hysteresis_mode.label()
            );
        }
        (verdict, outcome)
    }
}

impl<P: Platform + ?Sized + 'static> Domain for Restorer<P> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn interval(&self) -> Duration {
        self.cfg.poll
    }

    fn cycle(&mut self, stop: &StopSignal) -> Result<()> {
        self.step(stop);
        Ok(())
    }

    fn run_immediately(&self) -> bool {
        true
    }
}
