// MORAT LINUX BACKEND
// procfs + sysfs IMPLEMENTATION OF THE PLATFORM TRAITS.
//
// EVERY PATH IS RESOLVED UNDER A CONFIGURABLE ROOT ("/" IN PRODUCTION, A
// TEMP DIRECTORY IN TESTS). PROCESS AFFINITY IS THE ONE CONTROL POINT THAT
// IS A SYSCALL RATHER THAN A FILE, SO IT ALWAYS TARGETS THE LIVE KERNEL.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};
use crate::platform::{ControlPoints, CoreId, CpuTimes, IrqLine, ProcessInfo, Telemetry};

// "  24:    1234   5678   GICv3  27 Level  arch_timer"
// "LOC:  991823  883721   Local timer interrupts"
const IRQ_ROW: &str = r"^\s*([0-9A-Za-z_]+):\s*(.*)$";

pub struct SysfsPlatform {
    root: PathBuf,
    irq_row: Regex,
}

impl SysfsPlatform {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let irq_row = Regex::new(IRQ_ROW).map_err(|e| Error::invalid(e.to_string()))?;
        Ok(Self {
            root: root.into(),
            irq_row,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel.trim_start_matches('/'))
    }

    fn read(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.path(rel)).ok()
    }

    fn read_num<T: std::str::FromStr>(&self, rel: &str) -> Option<T> {
        self.read(rel)?.trim().parse().ok()
    }

    fn write(&self, rel: &str, value: &str) -> Result<()> {
        let path = self.path(rel);
        fs::write(&path, value).map_err(|e| Error::actuation(path.display().to_string(), e))
    }

    fn cpufreq(core: CoreId, file: &str) -> String {
        format!("sys/devices/system/cpu/cpu{}/cpufreq/{}", core, file)
    }

    // --- /proc/interrupts ---

    pub fn parse_interrupts(&self, text: &str) -> Option<Vec<IrqLine>> {
        let mut rows = text.lines();
        let columns: Vec<CoreId> = rows
            .next()?
            .split_whitespace()
            .filter_map(|h| h.strip_prefix("CPU")?.parse().ok())
            .collect();
        if columns.is_empty() {
            return None;
        }

        let mut lines = Vec::new();
        for row in rows {
            let caps = match self.irq_row.captures(row) {
                Some(c) => c,
                None => continue,
            };
            let label = &caps[1];
            let mut tokens = caps[2].split_whitespace().peekable();

            let mut per_core = Vec::with_capacity(columns.len());
            for &core in &columns {
                match tokens.peek().and_then(|t| t.parse::<u64>().ok()) {
                    Some(n) => {
                        per_core.push((core, n));
                        tokens.next();
                    }
                    None => break,
                }
            }
            let name = tokens.collect::<Vec<_>>().join(" ");

            lines.push(IrqLine {
                irq: label.parse().ok(),
                name,
                per_core,
            });
        }
        Some(lines)
    }
}

// "0-3,6,8-9" -> [0,1,2,3,6,8,9]
pub fn parse_cpu_list(list: &str) -> Vec<CoreId> {
    let mut cores = Vec::new();
    for part in list.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((a, b)) => {
                if let (Ok(a), Ok(b)) = (a.trim().parse::<CoreId>(), b.trim().parse::<CoreId>()) {
                    cores.extend(a..=b);
                }
            }
            None => {
                if let Ok(c) = part.trim().parse() {
                    cores.push(c);
                }
            }
        }
    }
    cores.sort_unstable();
    cores.dedup();
    cores
}

// AGGREGATE "cpu" ROW: user nice system idle iowait irq softirq [steal ...]
pub fn parse_proc_stat(text: &str) -> Option<CpuTimes> {
    let row = text.lines().find(|l| l.starts_with("cpu "))?;
    let f: Vec<u64> = row
        .split_whitespace()
        .skip(1)
        .take(7)
        .map(|v| v.parse().ok())
        .collect::<Option<Vec<u64>>>()?;
    if f.len() < 7 {
        return None;
    }
    // COUNTERS NEAR u64::MAX SATURATE INSTEAD OF WRAPPING
    let busy = [f[0], f[1], f[2], f[5], f[6]]
        .iter()
        .fold(0u64, |acc, v| acc.saturating_add(*v));
    let idle = f[3].saturating_add(f[4]);
    Some(CpuTimes::from_busy_idle(busy, idle))
}

// Name / Uid / VmSize FROM /proc/<pid>/status. NO VmSize = KERNEL THREAD.
pub fn parse_status(pid: i32, text: &str) -> Option<ProcessInfo> {
    let mut name = None;
    let mut uid = None;
    let mut has_memory_map = false;
    for line in text.lines() {
        if let Some(v) = line.strip_prefix("Name:") {
            name = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("Uid:") {
            uid = v.split_whitespace().next().and_then(|u| u.parse().ok());
        } else if line.starts_with("VmSize:") {
            has_memory_map = true;
        }
    }
    Some(ProcessInfo {
        pid,
        name: name?,
        owner_uid: uid?,
        has_memory_map,
    })
}

impl Telemetry for SysfsPlatform {
    fn enumerate_online_cores(&self) -> Vec<CoreId> {
        self.read("sys/devices/system/cpu/online")
            .map(|s| parse_cpu_list(&s))
            .unwrap_or_default()
    }

    fn read_irq_lines(&self) -> Option<Vec<IrqLine>> {
        let text = self.read("proc/interrupts")?;
        self.parse_interrupts(&text)
    }

    // TENTHS OF A DEGREE
    fn read_battery_temperature(&self) -> Option<i32> {
        self.read_num::<i32>("sys/class/power_supply/battery/temp")
            .map(|t| t / 10)
    }

    fn read_battery_capacity_pct(&self) -> Option<u32> {
        self.read_num("sys/class/power_supply/battery/capacity")
    }

    // HOTTEST CPU ZONE, MILLIDEGREES
    fn read_peak_core_temperature(&self) -> Option<i32> {
        let zones = fs::read_dir(self.path("sys/class/thermal")).ok()?;
        zones
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("thermal_zone"))
            .filter_map(|e| {
                let dir = e.path();
                let kind = fs::read_to_string(dir.join("type")).ok()?.to_ascii_lowercase();
                if !(kind.contains("cpu") || kind.contains("pkg")) {
                    return None;
                }
                let milli: i32 = fs::read_to_string(dir.join("temp")).ok()?.trim().parse().ok()?;
                Some(milli / 1000)
            })
            .max()
    }

    fn read_cpu_time_counters(&self) -> Option<CpuTimes> {
        parse_proc_stat(&self.read("proc/stat")?)
    }

    fn read_core_max_frequency(&self, core: CoreId) -> Option<u32> {
        self.read_num(&Self::cpufreq(core, "cpuinfo_max_freq"))
    }

    fn read_core_current_ceiling(&self, core: CoreId) -> Option<u32> {
        self.read_num(&Self::cpufreq(core, "scaling_max_freq"))
    }

    fn enumerate_processes(&self) -> Vec<ProcessInfo> {
        let entries = match fs::read_dir(self.path("proc")) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        let mut procs: Vec<ProcessInfo> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str()?.parse::<i32>().ok())
            .filter_map(|pid| {
                // A PROCESS CAN EXIT BETWEEN readdir AND read
                let text = self.read(&format!("proc/{}/status", pid))?;
                parse_status(pid, &text)
            })
            .collect();
        procs.sort_by_key(|p| p.pid);
        procs
    }

    fn read_uptime(&self) -> Option<Duration> {
        let text = self.read("proc/uptime")?;
        let secs: f64 = text.split_whitespace().next()?.parse().ok()?;
        // NEGATIVE, NaN OR BEYOND Duration::MAX
        Duration::try_from_secs_f64(secs).ok()
    }
}

impl ControlPoints for SysfsPlatform {
    fn write_core_ceiling(&self, core: CoreId, khz: u32) -> Result<()> {
        self.write(&Self::cpufreq(core, "scaling_max_freq"), &khz.to_string())
    }

    fn set_process_affinity(&self, pid: i32, cores: &[CoreId]) -> Result<()> {
        let target = format!("pid {}", pid);
        if cores.is_empty() {
            return Err(Error::actuation(
                target,
                io::Error::new(io::ErrorKind::InvalidInput, "empty core set"),
            ));
        }

        let setsize = libc::CPU_SETSIZE as usize;
        if let Some(&bad) = cores.iter().find(|&&c| c as usize >= setsize) {
            return Err(Error::actuation(
                target,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cpu{} beyond CPU_SETSIZE {}", bad, setsize),
                ),
            ));
        }

        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        for &core in cores {
            unsafe { libc::CPU_SET(core as usize, &mut set) };
        }
        let rc = unsafe {
            libc::sched_setaffinity(pid, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc != 0 {
            return Err(Error::actuation(target, io::Error::last_os_error()));
        }
        Ok(())
    }

    fn set_irq_affinity(&self, irq: u32, cores: &[CoreId]) -> Result<()> {
        let list = cores
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.write(&format!("proc/irq/{}/smp_affinity_list", irq), &list)
    }

    fn drop_caches(&self, level: u8) -> Result<()> {
        self.write("proc/sys/vm/drop_caches", &level.to_string())
    }
}
