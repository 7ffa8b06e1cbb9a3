// MORAT IRQ BALANCER
// 1-SECOND LOOP. SUMS THE INTERRUPT TABLE PER CORE, FINDS THE BUSIEST AND
// IDLEST CORE, AND MOVES THE BUSIEST ROUTABLE LINE ACROSS WHEN THE SPREAD
// EXCEEDS THE CURRENT MEAN PLUS A BASE CONSTANT.
//
// GUARDS, IN ORDER: TOPOLOGY DIRECTION, PEAK CORE TEMPERATURE, LINE BLACKLIST.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::actuator::{self, Outcome};
use crate::config::BalancerConfig;
use crate::control::{Domain, StopSignal};
use crate::decision::{self, Action, Decision, DecisionState, Subject};
use crate::error::Result;
use crate::event::SharedLog;
use crate::guard::{self, Blacklist};
use crate::platform::Platform;
use crate::sampler;
use crate::topology::{ClassifyRule, Topology};

pub const NAME: &str = "balancer";

pub struct Balancer<P: Platform + ?Sized> {
    platform: Arc<P>,
    cfg: BalancerConfig,
    blacklist: Blacklist,
    state: DecisionState,
    log: SharedLog,
}

impl<P: Platform + ?Sized> Balancer<P> {
    pub fn new(platform: Arc<P>, cfg: BalancerConfig, log: SharedLog) -> Result<Self> {
        cfg.validate()?;
        let blacklist = Blacklist::new(&cfg.blacklist);
        Ok(Self {
            platform,
            cfg,
            blacklist,
            state: DecisionState::default(),
            log,
        })
    }

    pub fn state(&self) -> &DecisionState {
        &self.state
    }

    // ONE CYCLE. RETURNS THE DECISION THAT SURVIVED THE GUARDS AND WHAT HAPPENED.
    pub fn step(&mut self, stop: &StopSignal) -> (Decision, Outcome) {
        let current = match sampler::sample_irqs(&*self.platform) {
            Ok(s) => s,
            Err(e) => {
                debug!("{}: {}", NAME, e);
                return (Decision::NoAction, Outcome::default());
            }
        };

        let raw = decision::decide_migration(
            &current,
            self.state.previous_sample.as_ref(),
            self.cfg.base_constant,
        );
        self.state.previous_sample = Some(current);

        let approved = self.apply_guards(raw);
        if !approved.is_action() || stop.is_stopped() {
            return (Decision::NoAction, Outcome::default());
        }

        let outcome = actuator::dispatch(&*self.platform, NAME, &approved, &self.log);
        (approved, outcome)
    }

    fn apply_guards(&self, raw: Decision) -> Decision {
        let (source, to, lines) = match raw {
            Decision::Actuate {
                subject: Subject::Core(source),
                action: Action::MigrateIrqs { to, lines },
            } => (source, to, lines),
            _ => return Decision::NoAction,
        };

        // ONE CLASSIFICATION FOR THE WHOLE DECISION
        let topology = Topology::read(
            &*self.platform,
            ClassifyRule::Tolerance {
                band_khz: self.cfg.little_tolerance_khz,
            },
        );
        if guard::topology_veto(&topology, source, to) {
            debug!("{}: veto cpu{} -> cpu{} (big -> little)", NAME, source, to);
            return Decision::NoAction;
        }

        let peak = self.platform.read_peak_core_temperature();
        if guard::thermal_veto(peak, self.cfg.thermal_ceiling_c) {
            debug!("{}: veto, core temperature {:?}C >= {}C", NAME, peak, self.cfg.thermal_ceiling_c);
            return Decision::NoAction;
        }

        let lines = self.blacklist.filter_lines(lines, self.cfg.lines_per_cycle);
        if lines.is_empty() {
            debug!("{}: every candidate line on cpu{} is blacklisted", NAME, source);
            return Decision::NoAction;
        }

        Decision::Actuate {
            subject: Subject::Core(source),
            action: Action::MigrateIrqs { to, lines },
        }
    }
}

impl<P: Platform + ?Sized + 'static> Domain for Balancer<P> {
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
