//! Domain layer for HollyWool job tracking.
//!
//! Holds the job and session models, the stage state machine, the pure merge
//! used by pollers, and the ports (`JobApi`, `SessionGateway`, `DraftStore`,
//! `TitleGenerator`) implemented by `hollywool-infrastructure`.

pub mod clock;
pub mod config;
pub mod error;
pub mod job;
pub mod session;
pub mod timestamp;

pub use error::{HollywoolError, Result};
