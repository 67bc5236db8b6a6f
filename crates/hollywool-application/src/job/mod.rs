//! Job tracking services.
//!
//! - `poller`: [`JobPoller`], the live job map of one kind
//! - `timing`: [`StageTimingCache`], stage timing across polls

mod poller;
mod timing;

pub use poller::{JobPoller, JobUpdate};
pub use timing::StageTimingCache;
