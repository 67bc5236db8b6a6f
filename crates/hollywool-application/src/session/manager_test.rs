use super::*;
use chrono::{TimeZone, Utc};
use hollywool_core::clock::ManualClock;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

// Mock SessionGateway for testing
struct MockSessionGateway {
    stored: StdMutex<SessionSnapshot>,
    saves: StdMutex<Vec<SessionSnapshot>>,
    loads: StdMutex<usize>,
    fail_load: bool,
    fail_saves: StdMutex<bool>,
}

impl MockSessionGateway {
    fn new(stored: SessionSnapshot) -> Self {
        Self {
            stored: StdMutex::new(stored),
            saves: StdMutex::new(Vec::new()),
            loads: StdMutex::new(0),
            fail_load: false,
            fail_saves: StdMutex::new(false),
        }
    }

    fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::new(SessionSnapshot::default())
        }
    }

    fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    fn last_saved(&self) -> SessionSnapshot {
        self.stored.lock().unwrap().clone()
    }

    fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }
}

#[async_trait::async_trait]
impl SessionGateway for MockSessionGateway {
    async fn load(&self, _kind: SessionKind) -> Result<SessionSnapshot> {
        *self.loads.lock().unwrap() += 1;
        if self.fail_load {
            return Err(HollywoolError::transport("connection refused"));
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, _kind: SessionKind, snapshot: &SessionSnapshot) -> Result<()> {
        if *self.fail_saves.lock().unwrap() {
            return Err(HollywoolError::http(503, "unavailable"));
        }
        self.saves.lock().unwrap().push(snapshot.clone());
        *self.stored.lock().unwrap() = snapshot.clone();
        Ok(())
    }
}

// Mock DraftStore for testing
#[derive(Default)]
struct MockDraftStore {
    drafts: StdMutex<HashMap<String, Value>>,
    fail_saves: bool,
}

#[async_trait::async_trait]
impl DraftStore for MockDraftStore {
    async fn load_draft(&self, _kind: SessionKind, session_id: &str) -> Result<Option<Value>> {
        Ok(self.drafts.lock().unwrap().get(session_id).cloned())
    }

    async fn save_draft(&self, _kind: SessionKind, session_id: &str, draft: &Value) -> Result<()> {
        if self.fail_saves {
            return Err(HollywoolError::io("disk full"));
        }
        self.drafts
            .lock()
            .unwrap()
            .insert(session_id.to_string(), draft.clone());
        Ok(())
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()))
}

fn session(id: &str, name: &str) -> Session {
    Session {
        id: id.to_string(),
        name: name.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap(),
        thumbnail: None,
        is_auto_named: None,
        results: Vec::new(),
    }
}

fn snapshot(sessions: Vec<Session>, current: Option<&str>) -> SessionSnapshot {
    SessionSnapshot {
        sessions,
        current_session_id: current.map(str::to_string),
    }
}

fn image_manager(gateway: Arc<MockSessionGateway>) -> SessionManager {
    SessionManager::new(SessionKind::Image, gateway, clock())
}

#[tokio::test]
async fn test_init_loads_once() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(vec![session("s-1", "One")], Some("s-1"))));
    let manager = image_manager(gateway.clone());

    let (first, second) = tokio::join!(manager.init(), manager.init());
    let third = manager.init().await;

    assert_eq!(*gateway.loads.lock().unwrap(), 1);
    assert_eq!(first, second);
    assert_eq!(third.current_session_id.as_deref(), Some("s-1"));
}

#[tokio::test]
async fn test_init_failure_falls_back_to_empty() {
    let gateway = Arc::new(MockSessionGateway::failing_load());
    let manager = image_manager(gateway.clone());

    let loaded = manager.init().await;

    assert!(loaded.is_empty());
    assert_eq!(loaded.current_session_id, None);
    // Still usable afterwards.
    let current = manager.ensure_current_session().await;
    assert_eq!(manager.current_session_id().await, Some(current.id));
}

#[tokio::test]
async fn test_create_session_goes_to_front_and_becomes_current() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(vec![session("s-1", "One")], Some("s-1"))));
    let manager = image_manager(gateway.clone());

    let created = manager.create_session(Some("Desert dunes".to_string())).await;

    let sessions = manager.sessions().await;
    assert_eq!(sessions[0].id, created.id);
    assert_eq!(sessions[1].id, "s-1");
    assert_eq!(manager.current_session_id().await, Some(created.id.clone()));
    assert_eq!(created.name, "Desert dunes");
    assert_eq!(gateway.save_count(), 1);
    assert_eq!(gateway.last_saved().current_session_id, Some(created.id));
}

#[tokio::test]
async fn test_delete_current_moves_pointer_to_first_remaining() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(
        vec![session("s-1", "One"), session("s-2", "Two")],
        Some("s-1"),
    )));
    let manager = image_manager(gateway.clone());

    manager.delete_session("s-1").await.unwrap();

    assert_eq!(manager.current_session_id().await.as_deref(), Some("s-2"));
    assert_eq!(gateway.last_saved().sessions.len(), 1);
}

#[tokio::test]
async fn test_delete_last_session_creates_fresh_one_with_single_save() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(vec![session("s-1", "One")], Some("s-1"))));
    let manager = image_manager(gateway.clone());

    manager.delete_session("s-1").await.unwrap();

    let current = manager.current_session().await.unwrap();
    assert_ne!(current.id, "s-1");
    assert_eq!(current.name, DEFAULT_SESSION_NAME);
    assert_eq!(manager.sessions().await.len(), 1);
    assert_eq!(gateway.save_count(), 1);
    assert!(!gateway.last_saved().contains("s-1"));
}

#[tokio::test]
async fn test_delete_non_current_keeps_pointer() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(
        vec![session("s-1", "One"), session("s-2", "Two")],
        Some("s-1"),
    )));
    let manager = image_manager(gateway);

    manager.delete_session("s-2").await.unwrap();

    assert_eq!(manager.current_session_id().await.as_deref(), Some("s-1"));
}

#[tokio::test]
async fn test_delete_only_session_without_pointer_creates_fresh_one() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(vec![session("s-1", "One")], None)));
    let manager = image_manager(gateway.clone());

    manager.delete_session("s-1").await.unwrap();

    let current = manager.current_session().await.unwrap();
    assert_ne!(current.id, "s-1");
    assert_eq!(manager.sessions().await.len(), 1);
    assert_eq!(gateway.last_saved().current_session_id, Some(current.id));
}

#[tokio::test]
async fn test_delete_repairs_dangling_pointer() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(
        vec![session("s-1", "One"), session("s-2", "Two")],
        Some("gone"),
    )));
    let manager = image_manager(gateway.clone());

    manager.delete_session("s-2").await.unwrap();

    assert_eq!(manager.current_session_id().await.as_deref(), Some("s-1"));
    assert_eq!(gateway.last_saved().current_session_id.as_deref(), Some("s-1"));
    assert_eq!(gateway.save_count(), 1);
}

#[tokio::test]
async fn test_delete_unknown_session_is_not_found() {
    let gateway = Arc::new(MockSessionGateway::new(SessionSnapshot::default()));
    let manager = image_manager(gateway.clone());

    let err = manager.delete_session("ghost").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(gateway.save_count(), 0);
}

#[tokio::test]
async fn test_manual_rename_freezes_auto_naming() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(vec![session("s-1", "One")], Some("s-1"))));
    let manager = image_manager(gateway);

    let renamed = manager.rename_session("s-1", "  My portraits ").await.unwrap();
    assert_eq!(renamed.name, "My portraits");
    assert_eq!(renamed.is_auto_named, Some(false));

    for title in ["Sunset Over Water", "Another Title"] {
        assert!(!manager.auto_rename_session("s-1", title).await.unwrap());
    }
    assert_eq!(manager.session("s-1").await.unwrap().name, "My portraits");
}

#[tokio::test]
async fn test_auto_rename_applies_when_absent_flag() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(vec![session("s-1", "One")], Some("s-1"))));
    let manager = image_manager(gateway);

    assert!(manager.auto_rename_session("s-1", "Misty Mountains").await.unwrap());

    let session = manager.session("s-1").await.unwrap();
    assert_eq!(session.name, "Misty Mountains");
    assert_eq!(session.is_auto_named, Some(true));
}

#[tokio::test]
async fn test_ensure_current_returns_existing_pointer_without_saving() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(
        vec![session("s-1", "One"), session("s-2", "Two")],
        Some("s-2"),
    )));
    let manager = image_manager(gateway.clone());

    assert_eq!(manager.ensure_current_session().await.id, "s-2");
    assert_eq!(gateway.save_count(), 0);
}

#[tokio::test]
async fn test_ensure_current_adopts_first_and_persists() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(
        vec![session("s-1", "One"), session("s-2", "Two")],
        Some("deleted-elsewhere"),
    )));
    let manager = image_manager(gateway.clone());

    assert_eq!(manager.ensure_current_session().await.id, "s-1");
    assert_eq!(gateway.save_count(), 1);
    assert_eq!(gateway.last_saved().current_session_id.as_deref(), Some("s-1"));
}

#[tokio::test]
async fn test_ensure_current_creates_when_empty() {
    let gateway = Arc::new(MockSessionGateway::new(SessionSnapshot::default()));
    let manager = image_manager(gateway.clone());

    let created = manager.ensure_current_session().await;

    assert_eq!(manager.sessions().await, vec![created.clone()]);
    assert_eq!(manager.current_session_id().await, Some(created.id));
}

#[tokio::test]
async fn test_attach_result_is_idempotent() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(vec![session("s-1", "One")], Some("s-1"))));
    let manager = image_manager(gateway.clone());

    let first = manager
        .attach_result("s-1", "batch-1", Some("/outputs/batch-1_0.png".to_string()))
        .await
        .unwrap();
    let again = manager
        .attach_result("s-1", "batch-1", Some("/outputs/other.png".to_string()))
        .await
        .unwrap();
    let second = manager.attach_result("s-1", "batch-2", None).await.unwrap();

    assert_eq!(first, AttachOutcome { appended: true, first_result: true });
    assert_eq!(again, AttachOutcome { appended: false, first_result: false });
    assert_eq!(second, AttachOutcome { appended: true, first_result: false });

    let session = manager.session("s-1").await.unwrap();
    assert_eq!(session.results, vec!["batch-1", "batch-2"]);
    assert_eq!(session.thumbnail.as_deref(), Some("/outputs/batch-1_0.png"));
    assert_eq!(gateway.save_count(), 2);
}

#[tokio::test]
async fn test_failed_save_keeps_memory_state_and_retries_on_next_mutation() {
    let gateway = Arc::new(MockSessionGateway::new(SessionSnapshot::default()));
    let manager = image_manager(gateway.clone());
    gateway.set_fail_saves(true);

    let first = manager.create_session(Some("First".to_string())).await;

    assert!(manager.is_dirty());
    assert_eq!(manager.sessions().await.len(), 1);
    assert_eq!(gateway.save_count(), 0);

    gateway.set_fail_saves(false);
    let second = manager.create_session(Some("Second".to_string())).await;

    assert!(!manager.is_dirty());
    let saved = gateway.last_saved();
    assert_eq!(saved.sessions.len(), 2);
    assert!(saved.contains(&first.id) && saved.contains(&second.id));
}

#[tokio::test]
async fn test_flush_retries_failed_save() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(vec![session("s-1", "One")], Some("s-1"))));
    let manager = image_manager(gateway.clone());
    gateway.set_fail_saves(true);
    manager.rename_session("s-1", "Renamed").await.unwrap();
    assert!(!manager.flush().await);

    gateway.set_fail_saves(false);
    assert!(manager.flush().await);
    assert_eq!(gateway.last_saved().sessions[0].name, "Renamed");
    // Nothing pending: no extra write.
    assert!(manager.flush().await);
    assert_eq!(gateway.save_count(), 1);
}

#[tokio::test]
async fn test_switch_session_flushes_outgoing_draft_first() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(
        vec![session("s-1", "One"), session("s-2", "Two")],
        Some("s-1"),
    )));
    let drafts = Arc::new(MockDraftStore::default());
    drafts
        .drafts
        .lock()
        .unwrap()
        .insert("s-2".to_string(), json!({"prompt": "saved for two"}));
    let manager = SessionManager::new(SessionKind::Image, gateway, clock()).with_drafts(drafts.clone());

    let incoming = manager
        .switch_session("s-2", Some(json!({"prompt": "half typed"})))
        .await
        .unwrap();

    assert_eq!(incoming, Some(json!({"prompt": "saved for two"})));
    assert_eq!(
        drafts.drafts.lock().unwrap().get("s-1"),
        Some(&json!({"prompt": "half typed"}))
    );
    assert_eq!(manager.current_session_id().await.as_deref(), Some("s-2"));
}

#[tokio::test]
async fn test_switch_session_aborts_when_draft_flush_fails() {
    let gateway = Arc::new(MockSessionGateway::new(snapshot(
        vec![session("s-1", "One"), session("s-2", "Two")],
        Some("s-1"),
    )));
    let drafts = Arc::new(MockDraftStore {
        fail_saves: true,
        ..Default::default()
    });
    let manager = SessionManager::new(SessionKind::Image, gateway, clock()).with_drafts(drafts);

    let result = manager.switch_session("s-2", Some(json!({"prompt": "unsaved"}))).await;

    assert!(result.is_err());
    assert_eq!(manager.current_session_id().await.as_deref(), Some("s-1"));
}
