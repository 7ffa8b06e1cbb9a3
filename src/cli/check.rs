use std::io::Read;
use std::path::Path;

use anyhow::Result;

use morat::screen::BacklightListener;
use morat::sysfs::SysfsPlatform;

// (LABEL, PATH UNDER ROOT, REQUIRED)
const SOURCES: &[(&str, &str, bool)] = &[
    ("cpu online mask", "sys/devices/system/cpu/online", true),
    ("interrupt table", "proc/interrupts", true),
    ("cpu time counters", "proc/stat", true),
    ("cpu0 max frequency", "sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq", true),
    ("cpu0 freq ceiling", "sys/devices/system/cpu/cpu0/cpufreq/scaling_max_freq", true),
    ("battery temperature", "sys/class/power_supply/battery/temp", false),
    ("battery capacity", "sys/class/power_supply/battery/capacity", false),
    ("thermal zones", "sys/class/thermal", false),
    ("irq affinity", "proc/irq", false),
    ("drop_caches", "proc/sys/vm/drop_caches", false),
    ("uptime", "proc/uptime", false),
];

fn check_kernel_config(root: &Path) -> bool {
    let file = match std::fs::File::open(root.join("proc/config.gz")) {
        Ok(f) => f,
        Err(_) => {
            println!("  /proc/config.gz       NOT FOUND (SKIPPED)");
            return true;
        }
    };
    let mut decoder = flate2::read::GzDecoder::new(file);
    let mut config = String::new();
    if decoder.read_to_string(&mut config).is_err() {
        println!("  /proc/config.gz       UNREADABLE (SKIPPED)");
        return true;
    }
    let found = config.lines().any(|l| l.trim() == "CONFIG_CPU_FREQ=y");
    if found {
        println!("  CONFIG_CPU_FREQ       OK");
    } else {
        println!("  CONFIG_CPU_FREQ       NOT FOUND -- frequency ceilings unavailable");
    }
    found
}

pub fn run_check(platform: &SysfsPlatform) -> Result<()> {
    println!("MORAT PLATFORM CHECK ({})", platform.root().display());
    println!();

    let mut ok = true;
    println!("SOURCES:");
    for &(label, rel, required) in SOURCES {
        let present = platform.path(rel).exists();
        let verdict = match (present, required) {
            (true, _) => "OK",
            (false, true) => "MISSING",
            (false, false) => "ABSENT (OPTIONAL)",
        };
        println!("  {:<22}{}", label, verdict);
        if required && !present {
            ok = false;
        }
    }

    match BacklightListener::discover(platform.root()) {
        Some(l) => println!("  {:<22}OK ({})", "backlight", l.path().display()),
        None => println!("  {:<22}ABSENT (OPTIONAL) -- reclaimer never sees the screen off", "backlight"),
    }
    println!();

    println!("KERNEL CONFIG:");
    if !check_kernel_config(platform.root()) {
        ok = false;
    }
    println!();

    if ok {
        println!("ALL CHECKS PASSED");
    } else {
        println!("SOME CHECKS FAILED");
        std::process::exit(1);
    }

    Ok(())
}
