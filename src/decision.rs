// MORAT DECISION ENGINE
// PURE FUNCTIONS: (CURRENT SAMPLE, PREVIOUS SAMPLE, CONFIG) -> DECISION.
// ZERO I/O. EVERYTHING HERE IS TESTABLE OFFLINE.

use std::time::{Duration, Instant};

use crate::config::{ReclaimConfig, RestorerConfig};
use crate::platform::{CoreId, IrqLine, ScreenEvent, ScreenState};
use crate::sampler::Sample;

// --- DECISION ---

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Subject {
    Core(CoreId),
    AllCores,
    Process { pid: i32, name: String },
    System,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrqTarget {
    pub irq: u32,
    pub name: String,
    pub delta: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    MigrateIrqs { to: CoreId, lines: Vec<IrqTarget> },
    RaiseCeilings,
    SetAffinity { cores: Vec<CoreId> },
    DropCaches { level: u8 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    NoAction,
    Actuate { subject: Subject, action: Action },
}

impl Decision {
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Actuate { .. })
    }
}

// PER-LOOP STATE CARRIED BETWEEN CYCLES. OWNED BY EXACTLY ONE LOOP.
#[derive(Clone, Debug, Default)]
pub struct DecisionState {
    pub previous_sample: Option<Sample>,
    pub last_action_time: Option<Instant>,
    pub hysteresis_mode: HysteresisMode,
}

// --- IRQ BALANCER ---

// DELTA PER CORE. A COUNTER THAT WENT BACKWARDS (WRAP, RESET) OR A CORE WITH
// NO PREVIOUS READING (HOTPLUG) CONTRIBUTES 0, NEVER A WRAPPED VALUE.
pub fn core_deltas(current: &[(CoreId, u64)], previous: &[(CoreId, u64)]) -> Vec<(CoreId, u64)> {
    current
        .iter()
        .map(|&(core, now)| {
            let delta = previous
                .iter()
                .find(|(c, _)| *c == core)
                .map(|&(_, before)| now.saturating_sub(before))
                .unwrap_or(0);
            (core, delta)
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IrqSpread {
    pub max_core: CoreId,
    pub max_delta: u64,
    pub min_core: CoreId,
    pub min_delta: u64,
    pub delta_avg: u64,
    pub dynamic_threshold: u64,
}

impl IrqSpread {
    pub fn spread(&self) -> u64 {
        self.max_delta - self.min_delta
    }

    // MIGRATE IFF DISTINCT CORES AND SPREAD >= MEAN + BASE
    pub fn triggers(&self) -> bool {
        self.max_core != self.min_core && self.spread() >= self.dynamic_threshold
    }
}

// BUSIEST / IDLEST CORE AND THE MEAN-RELATIVE THRESHOLD. TIES GO TO THE
// EARLIER CORE IN `deltas`. None FOR AN EMPTY CORE SET.
pub fn irq_spread(deltas: &[(CoreId, u64)], base_constant: u64) -> Option<IrqSpread> {
    let &(first_core, first_delta) = deltas.first()?;
    let mut spread = IrqSpread {
        max_core: first_core,
        max_delta: first_delta,
        min_core: first_core,
        min_delta: first_delta,
        delta_avg: 0,
        dynamic_threshold: 0,
    };
    let mut sum: u64 = 0;

    for &(core, delta) in deltas {
        if delta > spread.max_delta {
            spread.max_delta = delta;
            spread.max_core = core;
        }
        if delta < spread.min_delta {
            spread.min_delta = delta;
            spread.min_core = core;
        }
        sum = sum.saturating_add(delta);
    }

    spread.delta_avg = sum / deltas.len() as u64;
    spread.dynamic_threshold = spread.delta_avg.saturating_add(base_constant);
    Some(spread)
}

// ROUTABLE LINES THAT FIRED ON `core` THIS WINDOW, BUSIEST FIRST.
// A LINE MISSING FROM THE PREVIOUS TABLE HAS NO BASELINE AND IS SKIPPED.
pub fn line_deltas_on(core: CoreId, current: &[IrqLine], previous: &[IrqLine]) -> Vec<IrqTarget> {
    let mut targets: Vec<IrqTarget> = current
        .iter()
        .filter_map(|line| {
            let irq = line.irq?;
            let before = previous.iter().find(|p| p.irq == Some(irq))?;
            let delta = line.count_on(core).saturating_sub(before.count_on(core));
            (delta > 0).then(|| IrqTarget {
                irq,
                name: line.name.clone(),
                delta,
            })
        })
        .collect();
    targets.sort_by(|a, b| b.delta.cmp(&a.delta).then(a.irq.cmp(&b.irq)));
    targets
}

// FIRST CYCLE ONLY ESTABLISHES THE BASELINE
pub fn decide_migration(current: &Sample, previous: Option<&Sample>, base_constant: u64) -> Decision {
    let previous = match previous {
        Some(p) => p,
        None => return Decision::NoAction,
    };

    let deltas = core_deltas(&current.per_core_counter, &previous.per_core_counter);
    let spread = match irq_spread(&deltas, base_constant) {
        Some(s) if s.triggers() => s,
        _ => return Decision::NoAction,
    };

    let lines = line_deltas_on(spread.max_core, &current.irq_lines, &previous.irq_lines);
    if lines.is_empty() {
        return Decision::NoAction;
    }

    Decision::Actuate {
        subject: Subject::Core(spread.max_core),
        action: Action::MigrateIrqs {
            to: spread.min_core,
            lines,
        },
    }
}

// --- THERMAL RESTORER ---

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HysteresisMode {
    #[default]
    Short,
    Long,
}

impl HysteresisMode {
    pub fn cooldown(self, cfg: &RestorerConfig) -> Duration {
        match self {
            Self::Short => cfg.hysteresis_short,
            Self::Long => cfg.hysteresis_long,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Short => "SHORT",
            Self::Long => "LONG",
        }
    }
}

// NEAR THE LIMIT: DEBOUNCE LONGER. CLEARLY COLD (OR NO READING): SHORT.
pub fn select_mode(temp_c: Option<i32>, threshold_c: i32, delta_c: i32) -> HysteresisMode {
    match temp_c {
        Some(t) if t >= threshold_c.saturating_sub(delta_c) => HysteresisMode::Long,
        _ => HysteresisMode::Short,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    TempUnavailable,
    CoolingDown,
    TooHot(i32),
    LoadUnavailable,
    BelowLoad(u32),
    Open(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestoreVerdict {
    // None WHEN THE TEMPERATURE GATE FAILED BEFORE A MODE COULD BE CHOSEN
    pub mode: Option<HysteresisMode>,
    pub gate: Gate,
}

impl RestoreVerdict {
    pub fn should_restore(&self) -> bool {
        matches!(self.gate, Gate::Open(_))
    }
}

// GATES IN ORDER: TEMP PRESENT -> COOLDOWN -> BELOW THRESHOLD -> LOAD.
// `measure` ONLY RUNS IF EVERY EARLIER GATE PASSED (IT SLEEPS A WINDOW).
pub fn evaluate_restore<F>(
    last_action: Option<Instant>,
    temp_c: Option<i32>,
    now: Instant,
    cfg: &RestorerConfig,
    measure: F,
) -> RestoreVerdict
where
    F: FnOnce() -> Option<u32>,
{
    if cfg.require_temp_read && temp_c.is_none() {
        return RestoreVerdict {
            mode: None,
            gate: Gate::TempUnavailable,
        };
    }

    let mode = select_mode(temp_c, cfg.temp_threshold_c, cfg.hysteresis_delta_c);
    let verdict = |gate| RestoreVerdict {
        mode: Some(mode),
        gate,
    };

    if let Some(last) = last_action {
        if now.saturating_duration_since(last) < mode.cooldown(cfg) {
            return verdict(Gate::CoolingDown);
        }
    }

    if let Some(t) = temp_c {
        if t >= cfg.temp_threshold_c {
            return verdict(Gate::TooHot(t));
        }
    }

    match measure() {
        None => verdict(Gate::LoadUnavailable),
        Some(util) if util < cfg.load_threshold_pct => verdict(Gate::BelowLoad(util)),
        Some(util) => verdict(Gate::Open(util)),
    }
}

// NEW CEILING FOR ONE CORE, OR None IF NOTHING TO RAISE.
// NEVER ABOVE THE HARDWARE MAXIMUM; NEVER ACTS ON A MISSING OR ZERO READING.
pub fn ceiling_target(current_khz: Option<u32>, hw_max_khz: Option<u32>) -> Option<u32> {
    match (current_khz, hw_max_khz) {
        (Some(cur), Some(max)) if cur > 0 && max > 0 && cur < max => Some(max),
        _ => None,
    }
}

// --- CACHE RECLAIMER ---

pub fn reclaim_due(
    uptime: Option<Duration>,
    screen: Option<ScreenEvent>,
    now: Instant,
    cfg: &ReclaimConfig,
) -> bool {
    let uptime = match uptime {
        Some(u) => u,
        None => return false,
    };
    if uptime < cfg.min_uptime {
        return false;
    }
    match screen {
        Some(ev) if ev.state == ScreenState::Off => {
            now.saturating_duration_since(ev.at) > cfg.screen_off_delay
        }
        _ => false,
    }
}
