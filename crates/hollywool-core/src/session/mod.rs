//! Session domain module.
//!
//! - `model`: [`Session`], [`SessionSnapshot`] and [`SessionKind`]
//! - `gateway`: persistence, draft and title-generation ports
//! - `title`: deterministic fallback titles

mod gateway;
mod model;
mod title;

pub use gateway::{DraftStore, SessionGateway, TitleGenerator};
pub use model::{DEFAULT_SESSION_NAME, Session, SessionKind, SessionSnapshot};
pub use title::fallback_title;
