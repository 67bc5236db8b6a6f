//! Session management.
//!
//! - `manager`: [`SessionManager`], one instance per session kind

mod manager;

pub use manager::{AttachOutcome, SessionManager};
