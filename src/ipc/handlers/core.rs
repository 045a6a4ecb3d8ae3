use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use anyhow::Context;
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "revision": state.registry.revision(),
            "submissionCount": state.registry.len(),
        }),
    )
}

/// Opens the workspace store. A stored snapshot replaces the in-memory
/// registry. With no snapshot yet, the first workspace selected adopts the
/// current registry, while switching to a fresh one starts it empty.
/// Returns the number of records restored, if any.
pub fn select_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<Option<usize>> {
    let conn = db::open_db(path)
        .with_context(|| format!("failed to open workspace {}", path.to_string_lossy()))?;

    let mut restored = None;
    if state.config.persist_submissions {
        match db::load_submissions(&conn)? {
            Some(records) => {
                restored = Some(
                    state
                        .registry
                        .restore(records)
                        .context("stored submissions snapshot is inconsistent")?,
                );
            }
            // Only the first workspace adopts what was entered before it.
            None if state.workspace.is_none() => {
                if !state.registry.is_empty() {
                    db::save_submissions(&conn, state.registry.read())?;
                }
            }
            None => {
                state.registry.restore(Vec::new())?;
            }
        }
    }

    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    tracing::info!(workspace = %path.to_string_lossy(), ?restored, "workspace selected");
    Ok(restored)
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req.str_param("path").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match select_workspace(state, &path) {
        Ok(restored) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "restored": restored.unwrap_or(0),
                "revision": state.registry.revision(),
            }),
        ),
        Err(e) => {
            tracing::error!(error = ?e, "workspace select failed");
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
