// MORAT ERROR TAXONOMY
// NOTHING HERE IS FATAL TO THE PROCESS. A DOMAIN THAT CANNOT START IS SKIPPED,
// A CYCLE THAT CANNOT SAMPLE DOES NOTHING, A WRITE THAT FAILS IS LOGGED,
// A VETOED DOMAIN ENDS ITS OWN LOOP AND NO OTHER.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // ONE METRIC MISSING THIS CYCLE. THE GATE THAT NEEDED IT FAILS.
    #[error("sample unavailable: {0}")]
    SampleUnavailable(&'static str),

    // A CONTROL POINT REJECTED A WRITE. NO RETRY, NEXT CYCLE RE-EVALUATES.
    #[error("actuation failed on {target}: {source}")]
    ActuationFailed {
        target: String,
        #[source]
        source: io::Error,
    },

    // ONLY RAISED AT LOOP START. THE LOOP DOES NOT RUN.
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    // RETURNED FROM A CYCLE: THE DOMAIN CAN NO LONGER ACT, ITS LOOP ENDS
    #[error("domain vetoed: {0}")]
    VetoDomain(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn actuation(target: impl Into<String>, source: io::Error) -> Self {
        Self::ActuationFailed {
            target: target.into(),
            source,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid(reason.into())
    }

    pub fn veto(reason: impl Into<String>) -> Self {
        Self::VetoDomain(reason.into())
    }
}
