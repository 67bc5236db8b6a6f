use anyhow::{Context, Result};

use hollywool_application::{SessionManager, Workbench};
use hollywool_core::config::HollywoolConfig;
use hollywool_core::session::SessionKind;
use hollywool_infrastructure::HollywoolPaths;
use std::sync::Arc;

fn manager(config: &HollywoolConfig, paths: &HollywoolPaths, kind: SessionKind) -> Result<Arc<SessionManager>> {
    let workbench = Workbench::from_config(config, paths).context("Failed to set up session stores")?;
    Ok(workbench.sessions(kind))
}

/// Reports a save that did not reach the store; the change stays in memory only.
fn warn_if_unsaved(manager: &SessionManager) {
    if manager.is_dirty() {
        eprintln!("warning: {} sessions could not be saved", manager.kind());
    }
}

pub async fn list(config: &HollywoolConfig, paths: &HollywoolPaths, kind: SessionKind) -> Result<()> {
    let manager = manager(config, paths, kind)?;
    let snapshot = manager.init().await;
    if snapshot.is_empty() {
        println!("No {kind} sessions.");
        return Ok(());
    }
    for session in &snapshot.sessions {
        let marker = if snapshot.current_session_id.as_deref() == Some(session.id.as_str()) {
            "*"
        } else {
            " "
        };
        let naming = if session.allows_auto_rename() { "auto" } else { "user" };
        println!(
            "{marker} {}  {:<40} {:>3} results  ({naming}-named, created {})",
            session.id,
            session.name,
            session.results.len(),
            session.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn create(config: &HollywoolConfig, paths: &HollywoolPaths, kind: SessionKind, name: Option<String>) -> Result<()> {
    let manager = manager(config, paths, kind)?;
    let session = manager.create_session(name).await;
    warn_if_unsaved(&manager);
    println!("Created {kind} session {} ({})", session.id, session.name);
    Ok(())
}

pub async fn rename(config: &HollywoolConfig, paths: &HollywoolPaths, kind: SessionKind, id: &str, name: &str) -> Result<()> {
    let manager = manager(config, paths, kind)?;
    let session = manager.rename_session(id, name).await?;
    warn_if_unsaved(&manager);
    println!("Renamed {} to '{}'", session.id, session.name);
    Ok(())
}

pub async fn delete(config: &HollywoolConfig, paths: &HollywoolPaths, kind: SessionKind, id: &str) -> Result<()> {
    let manager = manager(config, paths, kind)?;
    manager.delete_session(id).await?;
    warn_if_unsaved(&manager);
    let current = manager.ensure_current_session().await;
    println!("Deleted {id}; current {kind} session is {} ({})", current.id, current.name);
    Ok(())
}

pub async fn switch(config: &HollywoolConfig, paths: &HollywoolPaths, kind: SessionKind, id: &str) -> Result<()> {
    let manager = manager(config, paths, kind)?;
    let draft = manager.switch_session(id, None).await?;
    warn_if_unsaved(&manager);
    println!("Current {kind} session is now {id}");
    if let Some(draft) = draft {
        println!("Saved draft:\n{}", serde_json::to_string_pretty(&draft)?);
    }
    Ok(())
}
