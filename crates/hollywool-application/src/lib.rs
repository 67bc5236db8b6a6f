//! Application layer for Hollywool.
//!
//! This crate coordinates the core domain with the infrastructure adapters:
//! per-kind session managers, live job pollers, the binder that records
//! completed jobs in their sessions, and the cross-kind activity feed.

pub mod binder;
pub mod job;
pub mod notifications;
pub mod scheduler;
pub mod session;
pub mod workbench;

pub use binder::{BindOutcome, OrphanReason, SessionJobBinder};
pub use job::{JobPoller, JobUpdate, StageTimingCache};
pub use notifications::{Activity, ActivityFeed, NotificationAggregator, time_ago};
pub use scheduler::{ScheduledTask, TaskControl};
pub use session::{AttachOutcome, SessionManager};
pub use workbench::{Workbench, WorkbenchDeps};
