//! HTTP adapters for the HollyWool backend.

mod client;
mod job_api;
mod session_gateway;
mod title_generator;

pub use client::{ApiClient, transport_error};
pub use job_api::{HttpJobApi, jobs_path};
pub use session_gateway::HttpSessionGateway;
pub use title_generator::HttpTitleGenerator;
