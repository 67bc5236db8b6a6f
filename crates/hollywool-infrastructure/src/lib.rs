//! Adapters implementing the `hollywool-core` ports: HTTP clients for the
//! backend, local JSON and in-memory stores, path resolution and config loading.

pub mod config_service;
pub mod http;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::http::{ApiClient, HttpJobApi, HttpSessionGateway, HttpTitleGenerator};
pub use crate::paths::HollywoolPaths;
pub use crate::storage::{
    FnSessionGateway, JsonFileStore, KindRoutedGateway, MemoryDraftStore, MemorySessionGateway,
};
