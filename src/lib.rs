// MORAT -- ADAPTIVE RESOURCE CONTROL LOOPS
// LIBRARY CRATE: PURE DECISION LOGIC, GUARDS, LOOP SCHEDULER, LINUX BACKEND.
// THE BINARY IN main.rs ONLY PARSES FLAGS AND WIRES THE LOOPS TOGETHER.

pub mod actuator;
pub mod config;
pub mod control;
pub mod decision;
pub mod domains;
pub mod error;
pub mod event;
pub mod guard;
pub mod platform;
pub mod recency;
pub mod sampler;
pub mod screen;
pub mod sysfs;
pub mod topology;

pub use error::{Error, Result};
