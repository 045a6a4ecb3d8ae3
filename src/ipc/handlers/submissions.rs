use crate::auth;
use crate::calc;
use crate::db;
use crate::ipc::error::{err, field_errors_json, ok, registry_err, validation_failed};
use crate::ipc::types::{AppState, Request};
use crate::registry::{RegistryError, Submission, SubmissionRegistry, UpsertInput};
use crate::validate::{self, SubmissionFields};
use serde_json::json;

fn params_object(req: &Request) -> serde_json::Value {
    if req.params.is_null() {
        json!({})
    } else {
        req.params.clone()
    }
}

fn persist(state: &AppState) -> anyhow::Result<()> {
    if !state.config.persist_submissions {
        return Ok(());
    }
    match state.db.as_ref() {
        Some(conn) => db::save_submissions(conn, state.registry.read()),
        None => Ok(()),
    }
}

/// Applies `f` to the registry and writes the new snapshot. If the write
/// fails the registry is put back exactly as it was.
pub(super) fn mutate<T>(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&mut SubmissionRegistry) -> Result<T, RegistryError>,
) -> Result<T, serde_json::Value> {
    let before = state.registry.clone();
    let out = f(&mut state.registry).map_err(|e| registry_err(&req.id, &e))?;
    if let Err(e) = persist(state) {
        tracing::error!(error = ?e, method = %req.method, "snapshot write failed; rolled back");
        state.registry = before;
        return Err(err(&req.id, "db_write_failed", format!("{e:#}"), None));
    }
    Ok(out)
}

pub(super) fn check_session(state: &AppState, req: &Request) -> Option<serde_json::Value> {
    if !state.config.require_login {
        return None;
    }
    let Some(conn) = state.db.as_ref() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    match auth::current_user(conn) {
        Ok(_) => None,
        Err(e) => Some(err(&req.id, e.code(), e.to_string(), None)),
    }
}

fn parse_upsert_input(req: &Request) -> Result<UpsertInput, serde_json::Value> {
    let mut input: UpsertInput = serde_json::from_value(params_object(req))
        .map_err(|e| err(&req.id, "bad_params", e.to_string(), None))?;
    input.name = input.name.trim().to_string();
    input.subject = input.subject.trim().to_string();
    input.grade = input.grade.trim().to_string();
    Ok(input)
}

fn upsert_field_errors(input: &UpsertInput) -> Vec<serde_json::Value> {
    let fields = SubmissionFields {
        name: &input.name,
        subject: &input.subject,
        grade: &input.grade,
        year_level: input.year_level.as_set().map(String::as_str),
        course: input.course.as_set().map(String::as_str),
    };
    field_errors_json(&validate::validate_submission_fields(&fields))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let revision = state.registry.revision();
    let since = req.params.get("sinceRevision").and_then(|v| v.as_u64());
    ok(
        &req.id,
        json!({
            "revision": revision,
            "changed": since != Some(revision),
            "submissions": state.registry.read(),
        }),
    )
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(id) = req.str_param("id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let Some(submission) = state.registry.get(id) else {
        return registry_err(&req.id, &RegistryError::NotFound(id.to_string()));
    };
    ok(
        &req.id,
        json!({
            "submission": submission,
            "average": calc::college_average(&submission.grades),
        }),
    )
}

fn handle_validate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let input = match parse_upsert_input(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let errors = upsert_field_errors(&input);
    ok(
        &req.id,
        json!({
            "valid": errors.is_empty(),
            "registered": state.registry.find_by_name(&input.name).is_some(),
            "errors": errors,
        }),
    )
}

fn handle_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = check_session(state, req) {
        return resp;
    }
    let input = match parse_upsert_input(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let errors = upsert_field_errors(&input);
    if !errors.is_empty() {
        return validation_failed(&req.id, errors);
    }

    let require_existing = req
        .params
        .get("requireExisting")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if require_existing && state.registry.find_by_name(&input.name).is_none() {
        return err(
            &req.id,
            "not_registered",
            format!("{} is not a registered student.", input.name),
            Some(json!({ "name": input.name })),
        );
    }

    let name = input.name.clone();
    match mutate(state, req, |reg| Ok(reg.upsert(input))) {
        Ok(outcome) => {
            tracing::info!(id = %outcome.id(), %name, created = outcome.created(), "submission upserted");
            ok(
                &req.id,
                json!({
                    "id": outcome.id(),
                    "created": outcome.created(),
                    "revision": state.registry.revision(),
                }),
            )
        }
        Err(resp) => resp,
    }
}

fn replacement_errors(submission: &Submission) -> Vec<serde_json::Value> {
    let mut errors = Vec::new();
    if let Err(e) = validate::validate_name(&submission.name) {
        errors.push(json!(e));
    }
    for (field, label, value) in [
        ("yearLevel", "year level", &submission.year_level),
        ("course", "course", &submission.course),
    ] {
        if let Err(e) = validate::validate_selection(field, label, value) {
            errors.push(json!(e));
        }
    }
    for (index, g) in submission.grades.iter().enumerate() {
        for check in [
            validate::validate_subject(&g.subject),
            validate::validate_grade(&g.grade),
        ] {
            if let Err(e) = check {
                errors.push(json!({
                    "field": e.field,
                    "code": e.code,
                    "message": e.message,
                    "index": index,
                }));
            }
        }
    }
    errors
}

fn handle_replace(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = check_session(state, req) {
        return resp;
    }
    let Some(raw) = req.params.get("submission") else {
        return err(&req.id, "bad_params", "missing submission", None);
    };
    let mut submission: Submission = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    submission.name = submission.name.trim().to_string();
    for g in submission.grades.iter_mut() {
        g.subject = g.subject.trim().to_string();
        g.grade = g.grade.trim().to_string();
    }

    let errors = replacement_errors(&submission);
    if !errors.is_empty() {
        return validation_failed(&req.id, errors);
    }

    let id = submission.id.clone();
    match mutate(state, req, |reg| reg.replace(submission)) {
        Ok(()) => {
            tracing::info!(%id, "submission replaced");
            ok(
                &req.id,
                json!({ "id": id, "revision": state.registry.revision() }),
            )
        }
        Err(resp) => resp,
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = check_session(state, req) {
        return resp;
    }
    let Some(id) = req.str_param("id").map(str::to_string) else {
        return err(&req.id, "bad_params", "missing id", None);
    };

    match mutate(state, req, |reg| reg.delete(&id)) {
        Ok(removed) => {
            tracing::info!(%id, name = %removed.name, "submission deleted");
            ok(
                &req.id,
                json!({
                    "id": id,
                    "name": removed.name,
                    "revision": state.registry.revision(),
                }),
            )
        }
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submissions.list" => Some(handle_list(state, req)),
        "submissions.get" => Some(handle_get(state, req)),
        "submissions.validate" => Some(handle_validate(state, req)),
        "submissions.upsert" => Some(handle_upsert(state, req)),
        "submissions.replace" => Some(handle_replace(state, req)),
        "submissions.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
