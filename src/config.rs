// MORAT POLICY CONFIGURATION
// ONE IMMUTABLE STRUCT PER DOMAIN. BUILT ONCE, VALIDATED AT LOOP START,
// READ-ONLY FOR THE LOOP'S LIFETIME. A CONFIG THAT FAILS validate() NEVER RUNS.

use std::time::Duration;

use crate::error::{Error, Result};

// --- IRQ BALANCER ---

pub const BALANCE_INTERVAL_MS: u64 = 1000;
pub const BALANCE_BASE_IRQS: u64 = 64;          // ADDED TO THE PER-CORE MEAN
pub const THERMAL_CEILING_C: i32 = 85;          // NO MIGRATION AT OR ABOVE
pub const LITTLE_TOLERANCE_KHZ: u32 = 100_000;  // LITTLE = WITHIN 100MHZ OF SLOWEST
pub const LINES_PER_CYCLE: usize = 1;

// DISPLAY, GPU, STORAGE, NETWORK, POWER, CORE TIMER
pub const DEFAULT_IRQ_BLACKLIST: &[&str] = &[
    "mdss", "kgsl", "msm_drm", "dsi", "gpu",
    "ufshcd", "mmc", "sdhci", "nvme",
    "wlan", "rmnet", "eth", "ipa",
    "pmic", "qpnp", "spmi",
    "arch_timer", "timer",
];

// --- THERMAL RESTORER ---

pub const RESTORE_POLL_MS: u64 = 30_000;
pub const LOAD_WINDOW_MS: u64 = 5_000;
pub const LOAD_THRESHOLD_PCT: u32 = 15;
pub const TEMP_THRESHOLD_C: i32 = 42;
pub const HYSTERESIS_SHORT_SECS: u64 = 60;
pub const HYSTERESIS_LONG_SECS: u64 = 180;
pub const HYSTERESIS_DELTA_C: i32 = 4;

// --- AFFINITY PINNER ---

pub const AFFINITY_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_PIN_TARGETS: &[&str] = &[
    "surfaceflinger",
    "audioserver",
    "mediaserver",
    "hwcomposer",
    "vendor.mediaserver",
    "vendor.audio-hal",
    "vendor.audio",
];

// --- APP BOOSTER ---

pub const BOOST_INTERVAL_MS: u64 = 300;
pub const BOOST_COOLDOWN_MS: u64 = 1000;
pub const MAX_BOOSTED_TASKS: usize = 64;
pub const UID_APP_START: u32 = 10_000;
pub const BIG_CORE_CUTOFF_KHZ: u32 = 2_000_000;

// --- CACHE RECLAIMER ---

pub const RECLAIM_INTERVAL_SECS: u64 = 60;
pub const RECLAIM_MIN_UPTIME_SECS: u64 = 3 * 3600;
pub const SCREEN_OFF_DELAY_SECS: u64 = 10 * 60;
pub const DROP_CACHES_LEVEL: u8 = 3;            // PAGECACHE + DENTRIES + INODES
pub const SCREEN_POLL_MS: u64 = 1000;

fn nonzero(d: Duration, what: &str) -> Result<()> {
    if d.is_zero() {
        return Err(Error::invalid(format!("{} must be non-zero", what)));
    }
    Ok(())
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalancerConfig {
    pub interval: Duration,
    pub base_constant: u64,
    pub thermal_ceiling_c: i32,
    pub little_tolerance_khz: u32,
    pub lines_per_cycle: usize,
    pub blacklist: Vec<String>,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(BALANCE_INTERVAL_MS),
            base_constant: BALANCE_BASE_IRQS,
            thermal_ceiling_c: THERMAL_CEILING_C,
            little_tolerance_khz: LITTLE_TOLERANCE_KHZ,
            lines_per_cycle: LINES_PER_CYCLE,
            blacklist: to_owned_list(DEFAULT_IRQ_BLACKLIST),
        }
    }
}

impl BalancerConfig {
    pub fn validate(&self) -> Result<()> {
        nonzero(self.interval, "balancer interval")?;
        if self.lines_per_cycle == 0 {
            return Err(Error::invalid("balancer lines per cycle must be at least 1"));
        }
        if self.blacklist.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::invalid("balancer blacklist contains an empty pattern"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestorerConfig {
    pub poll: Duration,
    pub load_window: Duration,
    pub load_threshold_pct: u32,
    pub temp_threshold_c: i32,
    pub require_temp_read: bool,
    pub hysteresis_short: Duration,
    pub hysteresis_long: Duration,
    pub hysteresis_delta_c: i32,
}

impl Default for RestorerConfig {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(RESTORE_POLL_MS),
            load_window: Duration::from_millis(LOAD_WINDOW_MS),
            load_threshold_pct: LOAD_THRESHOLD_PCT,
            temp_threshold_c: TEMP_THRESHOLD_C,
            require_temp_read: true,
            hysteresis_short: Duration::from_secs(HYSTERESIS_SHORT_SECS),
            hysteresis_long: Duration::from_secs(HYSTERESIS_LONG_SECS),
            hysteresis_delta_c: HYSTERESIS_DELTA_C,
        }
    }
}

impl RestorerConfig {
    pub fn validate(&self) -> Result<()> {
        nonzero(self.poll, "restorer poll interval")?;
        nonzero(self.load_window, "restorer load window")?;
        if self.load_threshold_pct > 100 {
            return Err(Error::invalid(format!(
                "load threshold {}% is above 100%",
                self.load_threshold_pct
            )));
        }
        if self.hysteresis_delta_c < 0 {
            return Err(Error::invalid("hysteresis delta must not be negative"));
        }
        if self.hysteresis_short > self.hysteresis_long {
            return Err(Error::invalid(format!(
                "short hysteresis {:?} exceeds long hysteresis {:?}",
                self.hysteresis_short, self.hysteresis_long
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AffinityConfig {
    pub interval: Duration,
    pub little_tolerance_khz: u32,
    pub targets: Vec<String>,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(AFFINITY_INTERVAL_SECS),
            little_tolerance_khz: LITTLE_TOLERANCE_KHZ,
            targets: to_owned_list(DEFAULT_PIN_TARGETS),
        }
    }
}

impl AffinityConfig {
    pub fn validate(&self) -> Result<()> {
        nonzero(self.interval, "affinity interval")?;
        if self.targets.is_empty() {
            return Err(Error::invalid("affinity pinner has no target processes"));
        }
        if self.targets.iter().any(|t| t.is_empty()) {
            return Err(Error::invalid("affinity target list contains an empty name"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoostConfig {
    pub interval: Duration,
    pub cooldown: Duration,
    pub capacity: usize,
    pub app_uid_start: u32,
    pub big_core_cutoff_khz: u32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(BOOST_INTERVAL_MS),
            cooldown: Duration::from_millis(BOOST_COOLDOWN_MS),
            capacity: MAX_BOOSTED_TASKS,
            app_uid_start: UID_APP_START,
            big_core_cutoff_khz: BIG_CORE_CUTOFF_KHZ,
        }
    }
}

impl BoostConfig {
    pub fn validate(&self) -> Result<()> {
        nonzero(self.interval, "boost interval")?;
        if self.capacity == 0 {
            return Err(Error::invalid("boost cache capacity must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReclaimConfig {
    pub interval: Duration,
    pub min_uptime: Duration,
    pub screen_off_delay: Duration,
    pub drop_level: u8,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(RECLAIM_INTERVAL_SECS),
            min_uptime: Duration::from_secs(RECLAIM_MIN_UPTIME_SECS),
            screen_off_delay: Duration::from_secs(SCREEN_OFF_DELAY_SECS),
            drop_level: DROP_CACHES_LEVEL,
        }
    }
}

impl ReclaimConfig {
    pub fn validate(&self) -> Result<()> {
        nonzero(self.interval, "reclaim interval")?;
        if !(1..=3).contains(&self.drop_level) {
            return Err(Error::invalid(format!(
                "drop_caches level {} outside 1..=3",
                self.drop_level
            )));
        }
        Ok(())
    }
}
