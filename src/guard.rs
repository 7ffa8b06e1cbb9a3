// MORAT SAFETY GUARDS
// TOTAL PREDICATES APPLIED AFTER A DECISION AND BEFORE ACTUATION.
// A GUARD CAN ONLY VETO OR NARROW A DECISION, NEVER WIDEN IT.

use crate::decision::IrqTarget;
use crate::platform::{CoreId, ProcessInfo};
use crate::topology::{CoreClass, Topology};

// VETO WHEN THE IDLEST CORE IS LITTLE AND THE BUSIEST IS BIG.
// LITERAL RULE: THIS ALSO BLOCKS OFFLOADING A BIG CORE ONTO A LITTLE ONE.
pub fn topology_veto(topology: &Topology, source: CoreId, target: CoreId) -> bool {
    topology.class_of(target) == Some(CoreClass::Little)
        && topology.class_of(source) == Some(CoreClass::Big)
}

// NO READING, NO VETO
pub fn thermal_veto(peak_core_temp_c: Option<i32>, ceiling_c: i32) -> bool {
    matches!(peak_core_temp_c, Some(t) if t >= ceiling_c)
}

// CASE-INSENSITIVE PREFIX MATCH ON EACH WHITESPACE TOKEN OF A DEVICE NAME.
// "IO-APIC 2-edge timer" IS CAUGHT BY "timer"; "ufshcd@1d84000" BY "ufshcd".
#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    prefixes: Vec<String>,
}

impl Blacklist {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        name.split_whitespace().any(|token| {
            let token = token.to_ascii_lowercase();
            self.prefixes.iter().any(|p| token.starts_with(p.as_str()))
        })
    }

    // DROP BLACKLISTED LINES, KEEP ORDER, CAP AT `limit`
    pub fn filter_lines(&self, lines: Vec<IrqTarget>, limit: usize) -> Vec<IrqTarget> {
        lines
            .into_iter()
            .filter(|l| !self.matches(&l.name))
            .take(limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

// USER-INSTALLED APP: APP UID RANGE AND A REAL ADDRESS SPACE (NOT A KTHREAD)
pub fn is_boost_candidate(process: &ProcessInfo, app_uid_start: u32) -> bool {
    process.has_memory_map && process.owner_uid >= app_uid_start
}

// SUBSTRING MATCH: "vendor.audio-hal-2-0" IS A "vendor.audio" TARGET
pub fn is_pin_target(name: &str, targets: &[String]) -> bool {
    targets.iter().any(|t| name.contains(t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_IRQ_BLACKLIST;
    use crate::topology::{ClassifyRule, CoreTopologyInfo};

    fn big_little() -> Topology {
        let infos = [
            CoreTopologyInfo { core_id: 0, max_freq_khz: 1_800_000 },
            CoreTopologyInfo { core_id: 1, max_freq_khz: 1_800_000 },
            CoreTopologyInfo { core_id: 2, max_freq_khz: 2_800_000 },
            CoreTopologyInfo { core_id: 3, max_freq_khz: 2_800_000 },
        ];
        Topology::classify(&infos, ClassifyRule::Tolerance { band_khz: 100_000 })
    }

    fn target(irq: u32, name: &str) -> IrqTarget {
        IrqTarget { irq, name: name.into(), delta: 100 }
    }

    #[test]
    fn topology_blocks_big_to_little() {
        let t = big_little();
        assert!(topology_veto(&t, 2, 0));
    }

    #[test]
    fn topology_allows_other_directions() {
        let t = big_little();
        assert!(!topology_veto(&t, 0, 2)); // LITTLE -> BIG
        assert!(!topology_veto(&t, 0, 1)); // LITTLE -> LITTLE
        assert!(!topology_veto(&t, 2, 3)); // BIG -> BIG
    }

    #[test]
    fn topology_unknown_core_no_veto() {
        let t = big_little();
        assert!(!topology_veto(&t, 9, 0));
    }

    #[test]
    fn thermal_veto_at_ceiling() {
        assert!(thermal_veto(Some(85), 85));
        assert!(thermal_veto(Some(99), 85));
        assert!(!thermal_veto(Some(84), 85));
        assert!(!thermal_veto(None, 85));
    }

    #[test]
    fn default_blacklist_catches_critical_subsystems() {
        let b = Blacklist::new(DEFAULT_IRQ_BLACKLIST);
        assert!(b.matches("GICv3 115 Level mdss"));
        assert!(b.matches("GICv3 332 Level kgsl-3d0"));
        assert!(b.matches("GICv3 297 Level ufshcd"));
        assert!(b.matches("IR-PCI-MSI 524288-edge nvme0q0"));
        assert!(b.matches("GICv3 27 Level arch_timer"));
        assert!(b.matches("IO-APIC 2-edge timer"));
        assert!(b.matches("PCI-MSI 1-edge eth0"));
        assert!(!b.matches("IO-APIC 1-edge i8042"));
        assert!(!b.matches("IR-PCI-MSI 327680-edge xhci_hcd"));
    }

    #[test]
    fn blacklist_is_case_insensitive() {
        let b = Blacklist::new(["GPU"]);
        assert!(b.matches("msi gpu_irq"));
        assert!(b.matches("msi Gpu"));
    }

    #[test]
    fn filter_lines_keeps_order_and_limit() {
        let b = Blacklist::new(["mdss"]);
        let lines = vec![target(5, "mdss"), target(6, "i8042"), target(7, "xhci_hcd"), target(8, "ahci")];
        let kept = b.filter_lines(lines, 2);
        let ids: Vec<u32> = kept.iter().map(|l| l.irq).collect();
        assert_eq!(ids, vec![6, 7]);
    }

    #[test]
    fn empty_patterns_ignored() {
        let b = Blacklist::new(["", "  "]);
        assert!(b.is_empty());
        assert!(!b.matches("anything"));
    }

    #[test]
    fn boost_candidate_rules() {
        let app = ProcessInfo { pid: 1, name: "com.game".into(), owner_uid: 10_123, has_memory_map: true };
        let system = ProcessInfo { owner_uid: 1000, ..app.clone() };
        let kthread = ProcessInfo { has_memory_map: false, ..app.clone() };
        assert!(is_boost_candidate(&app, 10_000));
        assert!(!is_boost_candidate(&system, 10_000));
        assert!(!is_boost_candidate(&kthread, 10_000));
    }

    #[test]
    fn pin_target_substring() {
        let targets = vec!["vendor.audio".to_string(), "surfaceflinger".to_string()];
        assert!(is_pin_target("vendor.audio-hal-2-0", &targets));
        assert!(is_pin_target("surfaceflinger", &targets));
        assert!(!is_pin_target("system_server", &targets));
    }
}
