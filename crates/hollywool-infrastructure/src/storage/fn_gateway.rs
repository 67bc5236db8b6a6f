//! Session gateway built from a pluggable load/save closure pair.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

use hollywool_core::error::Result;
use hollywool_core::session::{SessionGateway, SessionKind, SessionSnapshot};

type LoadFn = dyn Fn(SessionKind) -> BoxFuture<'static, Result<SessionSnapshot>> + Send + Sync;
type SaveFn = dyn Fn(SessionKind, SessionSnapshot) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// Adapts two async closures into a [`SessionGateway`].
#[derive(Clone)]
pub struct FnSessionGateway {
    load: Arc<LoadFn>,
    save: Arc<SaveFn>,
}

impl FnSessionGateway {
    pub fn new<L, S>(load: L, save: S) -> Self
    where
        L: Fn(SessionKind) -> BoxFuture<'static, Result<SessionSnapshot>> + Send + Sync + 'static,
        S: Fn(SessionKind, SessionSnapshot) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Self {
            load: Arc::new(load),
            save: Arc::new(save),
        }
    }
}

impl std::fmt::Debug for FnSessionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSessionGateway").finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionGateway for FnSessionGateway {
    async fn load(&self, kind: SessionKind) -> Result<SessionSnapshot> {
        (self.load)(kind).await
    }

    async fn save(&self, kind: SessionKind, snapshot: &SessionSnapshot) -> Result<()> {
        (self.save)(kind, snapshot.clone()).await
    }
}

/// Routes each kind to its own gateway.
#[derive(Clone)]
pub struct KindRoutedGateway {
    routes: Vec<(SessionKind, Arc<dyn SessionGateway>)>,
    fallback: Arc<dyn SessionGateway>,
}

impl KindRoutedGateway {
    pub fn new(fallback: Arc<dyn SessionGateway>) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    pub fn route(mut self, kind: SessionKind, gateway: Arc<dyn SessionGateway>) -> Self {
        self.routes.retain(|(k, _)| *k != kind);
        self.routes.push((kind, gateway));
        self
    }

    fn gateway(&self, kind: SessionKind) -> &Arc<dyn SessionGateway> {
        self.routes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, gateway)| gateway)
            .unwrap_or(&self.fallback)
    }
}

#[async_trait]
impl SessionGateway for KindRoutedGateway {
    async fn load(&self, kind: SessionKind) -> Result<SessionSnapshot> {
        self.gateway(kind).load(kind).await
    }

    async fn save(&self, kind: SessionKind, snapshot: &SessionSnapshot) -> Result<()> {
        self.gateway(kind).save(kind, snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySessionGateway;
    use chrono::Utc;
    use futures::FutureExt;
    use hollywool_core::error::HollywoolError;
    use hollywool_core::session::Session;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_closures_receive_full_snapshot() {
        let saved: Arc<Mutex<Vec<(SessionKind, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = saved.clone();
        let gateway = FnSessionGateway::new(
            |_| async { Ok::<_, HollywoolError>(SessionSnapshot::default()) }.boxed(),
            move |kind, snapshot| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push((kind, snapshot.sessions.len()));
                    Ok::<_, HollywoolError>(())
                }
                .boxed()
            },
        );
        let snapshot = SessionSnapshot {
            sessions: vec![Session::new(None, Utc::now()), Session::new(None, Utc::now())],
            current_session_id: None,
        };

        gateway.save(SessionKind::Bulk, &snapshot).await.unwrap();

        assert!(gateway.load(SessionKind::Bulk).await.unwrap().is_empty());
        assert_eq!(*saved.lock().unwrap(), vec![(SessionKind::Bulk, 2)]);
    }

    #[tokio::test]
    async fn test_routes_by_kind() {
        let remote = Arc::new(MemorySessionGateway::new());
        let local = Arc::new(MemorySessionGateway::new());
        let gateway = KindRoutedGateway::new(local.clone()).route(SessionKind::Image, remote.clone());

        gateway.save(SessionKind::Image, &SessionSnapshot::default()).await.unwrap();
        gateway.save(SessionKind::Video, &SessionSnapshot::default()).await.unwrap();

        assert_eq!(remote.save_count(), 1);
        assert_eq!(local.save_count(), 1);
        assert!(local.stored(SessionKind::Video).await.is_some());
        assert!(local.stored(SessionKind::Image).await.is_none());
    }
}
