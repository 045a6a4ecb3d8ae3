use super::submissions::{check_session, mutate};
use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::registry::Submission;
use serde_json::json;
use std::path::PathBuf;

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(out_path) = req.str_param("outPath").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };
    match backup::export_bundle(state.registry.read(), &out_path) {
        Ok(summary) => {
            tracing::info!(path = %out_path.to_string_lossy(), records = summary.record_count, "bundle exported");
            ok(
                &req.id,
                json!({
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "recordCount": summary.record_count,
                    "sha256": summary.sha256,
                }),
            )
        }
        Err(e) => err(&req.id, "bundle_export_failed", format!("{e:#}"), None),
    }
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(in_path) = req.str_param("inPath").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };
    if let Some(resp) = check_session(state, req) {
        return resp;
    }
    let (records, summary) = match backup::import_bundle::<Submission>(&in_path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bundle_import_failed", format!("{e:#}"), None),
    };

    let record_count = match mutate(state, req, |reg| reg.restore(records)) {
        Ok(n) => n,
        Err(resp) => return resp,
    };

    tracing::info!(path = %in_path.to_string_lossy(), records = record_count, "bundle imported");
    ok(
        &req.id,
        json!({
            "bundleFormatDetected": summary.bundle_format_detected,
            "recordCount": summary.record_count,
            "revision": state.registry.revision(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportBundle" => Some(handle_export_bundle(state, req)),
        "backup.importBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
