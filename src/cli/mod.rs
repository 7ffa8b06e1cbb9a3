// MORAT COMMAND-LINE SURFACE
// run / check / probe, PLUS THE PER-DOMAIN TUNABLES. FLAGS ARE PARSED ONCE
// AND TURNED INTO THE IMMUTABLE CONFIG STRUCTS EACH LOOP IS BUILT FROM.

pub mod check;
pub mod probe;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use morat::config::{
    self, AffinityConfig, BalancerConfig, BoostConfig, ReclaimConfig, RestorerConfig,
};
use morat::domains::DomainKind;

#[derive(Parser)]
#[command(name = "morat")]
#[command(about = "MORAT -- ADAPTIVE RESOURCE CONTROL LOOPS FOR LINUX")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    // FILESYSTEM ROOT FOR /proc AND /sys (TESTING AGAINST A CAPTURED TREE)
    #[arg(long, global = true, default_value = "/")]
    pub root: PathBuf,

    // DEBUG-LEVEL LOGGING: EVERY DECISION AND VETO
    #[arg(long, global = true)]
    pub verbose: bool,

    // DUMP FULL ACTION LOG ON EXIT
    #[arg(long)]
    pub dump_log: bool,

    // COMMA LIST OF DOMAINS TO RUN (DEFAULT: ALL)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub domains: Vec<DomainKind>,

    #[command(flatten)]
    pub tunables: Tunables,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // START THE CONTROL LOOPS (DEFAULT)
    Run,
    // REPORT WHICH TELEMETRY SOURCES AND CONTROL POINTS EXIST
    Check,
    // PRINT ONE TELEMETRY LINE PER SECOND UNTIL CTRL+C
    Probe,
}

impl Cli {
    pub fn enabled_domains(&self) -> Vec<DomainKind> {
        if self.domains.is_empty() {
            return DomainKind::ALL.to_vec();
        }
        let mut kinds = Vec::new();
        for kind in &self.domains {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }
}

#[derive(Args)]
pub struct Tunables {
    // --- IRQ BALANCER ---
    #[arg(long, default_value_t = config::BALANCE_INTERVAL_MS)]
    pub balance_interval_ms: u64,

    // ADDED TO THE PER-CORE MEAN TO FORM THE MIGRATION THRESHOLD
    #[arg(long, default_value_t = config::BALANCE_BASE_IRQS)]
    pub balance_base: u64,

    // NO MIGRATION AT OR ABOVE THIS CORE TEMPERATURE (C)
    #[arg(long, default_value_t = config::THERMAL_CEILING_C)]
    pub thermal_ceiling: i32,

    #[arg(long, default_value_t = config::LINES_PER_CYCLE)]
    pub lines_per_cycle: usize,

    // REPLACES THE BUILT-IN DEVICE PREFIX LIST
    #[arg(long, value_delimiter = ',')]
    pub irq_blacklist: Vec<String>,

    // LITTLE = MAX FREQ WITHIN THIS MANY KHZ OF THE SLOWEST CORE
    #[arg(long, default_value_t = config::LITTLE_TOLERANCE_KHZ)]
    pub little_tolerance_khz: u32,

    // --- THERMAL RESTORER ---
    #[arg(long, default_value_t = config::RESTORE_POLL_MS)]
    pub restore_poll_ms: u64,

    #[arg(long, default_value_t = config::LOAD_WINDOW_MS)]
    pub load_window_ms: u64,

    #[arg(long, default_value_t = config::LOAD_THRESHOLD_PCT)]
    pub load_threshold: u32,

    // BATTERY TEMPERATURE (C) BELOW WHICH CEILINGS MAY BE RESTORED
    #[arg(long, default_value_t = config::TEMP_THRESHOLD_C)]
    pub temp_threshold: i32,

    // RESTORE EVEN WITHOUT A BATTERY TEMPERATURE READING
    #[arg(long)]
    pub allow_missing_temp: bool,

    #[arg(long, default_value_t = config::HYSTERESIS_SHORT_SECS)]
    pub hysteresis_short_s: u64,

    #[arg(long, default_value_t = config::HYSTERESIS_LONG_SECS)]
    pub hysteresis_long_s: u64,

    #[arg(long, default_value_t = config::HYSTERESIS_DELTA_C)]
    pub hysteresis_delta: i32,

    // --- AFFINITY PINNER ---
    #[arg(long, default_value_t = config::AFFINITY_INTERVAL_SECS)]
    pub pin_interval_s: u64,

    // REPLACES THE BUILT-IN SERVICE LIST
    #[arg(long, value_delimiter = ',')]
    pub pin_targets: Vec<String>,

    // --- APP BOOSTER ---
    #[arg(long, default_value_t = config::BOOST_INTERVAL_MS)]
    pub boost_interval_ms: u64,

    #[arg(long, default_value_t = config::BOOST_COOLDOWN_MS)]
    pub boost_cooldown_ms: u64,

    #[arg(long, default_value_t = config::MAX_BOOSTED_TASKS)]
    pub boost_capacity: usize,

    #[arg(long, default_value_t = config::UID_APP_START)]
    pub app_uid_start: u32,

    // BIG CORE = MAX FREQ STRICTLY ABOVE THIS (KHZ)
    #[arg(long, default_value_t = config::BIG_CORE_CUTOFF_KHZ)]
    pub big_core_cutoff_khz: u32,

    // --- CACHE RECLAIMER ---
    #[arg(long, default_value_t = config::RECLAIM_INTERVAL_SECS)]
    pub reclaim_interval_s: u64,

    #[arg(long, default_value_t = config::RECLAIM_MIN_UPTIME_SECS)]
    pub reclaim_min_uptime_s: u64,

    #[arg(long, default_value_t = config::SCREEN_OFF_DELAY_SECS)]
    pub screen_off_delay_s: u64,

    #[arg(long, default_value_t = config::DROP_CACHES_LEVEL)]
    pub drop_level: u8,
}

fn or_default(list: &[String], fallback: &[&str]) -> Vec<String> {
    if list.is_empty() {
        fallback.iter().map(|s| s.to_string()).collect()
    } else {
        list.to_vec()
    }
}

impl Tunables {
    pub fn balancer(&self) -> BalancerConfig {
        BalancerConfig {
            interval: Duration::from_millis(self.balance_interval_ms),
            base_constant: self.balance_base,
            thermal_ceiling_c: self.thermal_ceiling,
            little_tolerance_khz: self.little_tolerance_khz,
            lines_per_cycle: self.lines_per_cycle,
            blacklist: or_default(&self.irq_blacklist, config::DEFAULT_IRQ_BLACKLIST),
        }
    }

    pub fn restorer(&self) -> RestorerConfig {
        RestorerConfig {
            poll: Duration::from_millis(self.restore_poll_ms),
            load_window: Duration::from_millis(self.load_window_ms),
            load_threshold_pct: self.load_threshold,
            temp_threshold_c: self.temp_threshold,
            require_temp_read: !self.allow_missing_temp,
            hysteresis_short: Duration::from_secs(self.hysteresis_short_s),
            hysteresis_long: Duration::from_secs(self.hysteresis_long_s),
            hysteresis_delta_c: self.hysteresis_delta,
        }
    }

    pub fn affinity(&self) -> AffinityConfig {
        AffinityConfig {
            interval: Duration::from_secs(self.pin_interval_s),
            little_tolerance_khz: self.little_tolerance_khz,
            targets: or_default(&self.pin_targets, config::DEFAULT_PIN_TARGETS),
        }
    }

    pub fn boost(&self) -> BoostConfig {
        BoostConfig {
            interval: Duration::from_millis(self.boost_interval_ms),
            cooldown: Duration::from_millis(self.boost_cooldown_ms),
            capacity: self.boost_capacity,
            app_uid_start: self.app_uid_start,
            big_core_cutoff_khz: self.big_core_cutoff_khz,
        }
    }

    pub fn reclaim(&self) -> ReclaimConfig {
        ReclaimConfig {
            interval: Duration::from_secs(self.reclaim_interval_s),
            min_uptime: Duration::from_secs(self.reclaim_min_uptime_s),
            screen_off_delay: Duration::from_secs(self.screen_off_delay_s),
            drop_level: self.drop_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let cli = Cli::parse_from(["morat"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.tunables.balancer(), BalancerConfig::default());
        assert_eq!(cli.tunables.restorer(), RestorerConfig::default());
        assert_eq!(cli.tunables.affinity(), AffinityConfig::default());
        assert_eq!(cli.tunables.boost(), BoostConfig::default());
        assert_eq!(cli.tunables.reclaim(), ReclaimConfig::default());
        assert_eq!(cli.enabled_domains(), DomainKind::ALL.to_vec());
    }

    #[test]
    fn domain_list_and_overrides() {
        let cli = Cli::parse_from([
            "morat",
            "--domains",
            "balancer,restorer,balancer",
            "--irq-blacklist",
            "gpu,mdss",
            "--allow-missing-temp",
            "run",
        ]);
        assert!(cli.command == Some(Command::Run));
        assert_eq!(cli.enabled_domains(), vec![DomainKind::Balancer, DomainKind::Restorer]);
        assert_eq!(cli.tunables.balancer().blacklist, vec!["gpu".to_string(), "mdss".to_string()]);
        assert!(!cli.tunables.restorer().require_temp_read);
    }

    #[test]
    fn root_is_global() {
        let cli = Cli::parse_from(["morat", "check", "--root", "/tmp/fake"]);
        assert!(cli.command == Some(Command::Check));
        assert_eq!(cli.root, PathBuf::from("/tmp/fake"));
    }
}
