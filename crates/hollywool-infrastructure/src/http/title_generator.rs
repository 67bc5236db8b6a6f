//! HTTP title generator backed by `POST /api/generate-title`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hollywool_core::error::{HollywoolError, Result};
use hollywool_core::session::TitleGenerator;

use super::client::ApiClient;

#[derive(Serialize)]
struct TitleRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct TitleResponse {
    title: String,
}

#[derive(Debug, Clone)]
pub struct HttpTitleGenerator {
    client: ApiClient,
}

impl HttpTitleGenerator {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TitleGenerator for HttpTitleGenerator {
    async fn generate_title(&self, prompt: &str) -> Result<String> {
        let response: TitleResponse = self
            .client
            .post("/api/generate-title", &TitleRequest { prompt })
            .await?;
        let title = response.title.trim().to_string();
        if title.is_empty() {
            return Err(HollywoolError::internal("title generator returned an empty title"));
        }
        Ok(title)
    }
}
