// MORAT CORE TOPOLOGY
// BIG/LITTLE CLASSIFICATION FROM PER-CORE MAXIMUM FREQUENCY.
// PURE OVER THE READINGS IT IS GIVEN. RECOMPUTED EVERY CYCLE SO HOTPLUG AND
// POLICY CHANGES ARE PICKED UP; NEVER RECLASSIFIED MID-DECISION.

use crate::platform::{CoreId, Telemetry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreClass {
    Big,
    Little,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoreTopologyInfo {
    pub core_id: CoreId,
    pub max_freq_khz: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassifyRule {
    // LITTLE = WITHIN band_khz OF THE SLOWEST CORE. EVERYTHING ELSE IS BIG.
    Tolerance { band_khz: u32 },
    // BIG = STRICTLY ABOVE big_above_khz.
    Cutoff { big_above_khz: u32 },
}

#[derive(Clone, Debug, Default)]
pub struct Topology {
    cores: Vec<(CoreTopologyInfo, CoreClass)>,
}

impl Topology {
    // CORES REPORTING 0 KHZ HAVE NO USABLE READING AND ARE LEFT UNCLASSIFIED
    pub fn classify(infos: &[CoreTopologyInfo], rule: ClassifyRule) -> Self {
        let known: Vec<CoreTopologyInfo> = infos
            .iter()
            .copied()
            .filter(|i| i.max_freq_khz > 0)
            .collect();

        let cores = match rule {
            ClassifyRule::Tolerance { band_khz } => {
                let slowest = known.iter().map(|i| i.max_freq_khz).min().unwrap_or(0);
                let limit = slowest.saturating_add(band_khz);
                known
                    .into_iter()
                    .map(|i| {
                        let class = if i.max_freq_khz <= limit {
                            CoreClass::Little
                        } else {
                            CoreClass::Big
                        };
                        (i, class)
                    })
                    .collect()
            }
            ClassifyRule::Cutoff { big_above_khz } => known
                .into_iter()
                .map(|i| {
                    let class = if i.max_freq_khz > big_above_khz {
                        CoreClass::Big
                    } else {
                        CoreClass::Little
                    };
                    (i, class)
                })
                .collect(),
        };

        Self { cores }
    }

    pub fn read<T: Telemetry + ?Sized>(platform: &T, rule: ClassifyRule) -> Self {
        let infos: Vec<CoreTopologyInfo> = platform
            .enumerate_online_cores()
            .into_iter()
            .filter_map(|core_id| {
                platform
                    .read_core_max_frequency(core_id)
                    .map(|max_freq_khz| CoreTopologyInfo {
                        core_id,
                        max_freq_khz,
                    })
            })
            .collect();
        Self::classify(&infos, rule)
    }

    pub fn class_of(&self, core: CoreId) -> Option<CoreClass> {
        self.cores
            .iter()
            .find(|(i, _)| i.core_id == core)
            .map(|(_, c)| *c)
    }

    pub fn little_cores(&self) -> Vec<CoreId> {
        self.cores_of(CoreClass::Little)
    }

    pub fn big_cores(&self) -> Vec<CoreId> {
        self.cores_of(CoreClass::Big)
    }

    // LOWEST-NUMBERED BIG CORE
    pub fn first_big(&self) -> Option<CoreId> {
        self.big_cores().into_iter().min()
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    fn cores_of(&self, class: CoreClass) -> Vec<CoreId> {
        let mut ids: Vec<CoreId> = self
            .cores
            .iter()
            .filter(|(_, c)| *c == class)
            .map(|(i, _)| i.core_id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
