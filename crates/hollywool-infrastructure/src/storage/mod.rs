//! Session and draft stores.

pub mod atomic_json;
mod fn_gateway;
mod json_store;
mod memory;

pub use atomic_json::AtomicJsonFile;
pub use fn_gateway::{FnSessionGateway, KindRoutedGateway};
pub use json_store::JsonFileStore;
pub use memory::{MemoryDraftStore, MemorySessionGateway};
