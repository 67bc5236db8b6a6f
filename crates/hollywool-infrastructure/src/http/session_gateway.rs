//! HTTP implementation of [`SessionGateway`] against `/api/sessions`.

use async_trait::async_trait;

use hollywool_core::error::{HollywoolError, Result};
use hollywool_core::session::{SessionGateway, SessionKind, SessionSnapshot};

use super::client::ApiClient;

const SESSIONS_PATH: &str = "/api/sessions";

/// Backend session store. The backend keeps a single (image) session list;
/// other kinds are rejected with [`HollywoolError::Unsupported`].
#[derive(Debug, Clone)]
pub struct HttpSessionGateway {
    client: ApiClient,
}

impl HttpSessionGateway {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn supports(kind: SessionKind) -> bool {
        kind == SessionKind::Image
    }

    fn check(kind: SessionKind) -> Result<()> {
        if Self::supports(kind) {
            Ok(())
        } else {
            Err(HollywoolError::unsupported(format!("backend storage of {kind} sessions")))
        }
    }
}

#[async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn load(&self, kind: SessionKind) -> Result<SessionSnapshot> {
        Self::check(kind)?;
        self.client.get(SESSIONS_PATH, &()).await
    }

    async fn save(&self, kind: SessionKind, snapshot: &SessionSnapshot) -> Result<()> {
        Self::check(kind)?;
        let _echo: SessionSnapshot = self.client.post(SESSIONS_PATH, snapshot).await?;
        tracing::debug!("[HttpSessionGateway] Saved {} sessions", snapshot.sessions.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_non_image_kinds_are_unsupported() {
        let gateway = HttpSessionGateway::new(ApiClient::with_client(reqwest::Client::new(), "http://127.0.0.1:9"));
        let err = gateway.load(SessionKind::Video).await.unwrap_err();
        assert!(matches!(err, HollywoolError::Unsupported(_)));
        assert!(HttpSessionGateway::supports(SessionKind::Image));
    }
}
