// MORAT CONTROL DOMAINS
// ONE MODULE PER LOOP. EACH OWNS ITS STATE AND RUNS ON ITS OWN THREAD.

pub mod affinity;
pub mod appboost;
pub mod balancer;
pub mod reclaim;
pub mod restorer;

pub use affinity::Pinner;
pub use appboost::Booster;
pub use balancer::Balancer;
pub use reclaim::Reclaimer;
pub use restorer::Restorer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum DomainKind {
    Balancer,
    Restorer,
    Pinner,
    Booster,
    Reclaimer,
}

impl DomainKind {
    pub const ALL: [DomainKind; 5] = [
        Self::Balancer,
        Self::Restorer,
        Self::Pinner,
        Self::Booster,
        Self::Reclaimer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Balancer => balancer::NAME,
            Self::Restorer => restorer::NAME,
            Self::Pinner => affinity::NAME,
            Self::Booster => appboost::NAME,
            Self::Reclaimer => reclaim::NAME,
        }
    }
}
