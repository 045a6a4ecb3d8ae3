use serde_json::json;

use crate::registry::RegistryError;
use crate::validate::FieldError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn registry_err(id: &str, e: &RegistryError) -> serde_json::Value {
    let details = match e {
        RegistryError::NotFound(sid) | RegistryError::EmptyGrades(sid) => json!({ "id": sid }),
        RegistryError::NameConflict { name, existing_id } => {
            json!({ "name": name, "existingId": existing_id })
        }
        RegistryError::DuplicateName(name) => json!({ "name": name }),
        RegistryError::DuplicateId(sid) => json!({ "id": sid }),
    };
    err(id, e.code(), e.to_string(), Some(details))
}

pub fn validation_failed(id: &str, errors: Vec<serde_json::Value>) -> serde_json::Value {
    let message = errors
        .first()
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or("invalid input")
        .to_string();
    err(
        id,
        "validation_failed",
        message,
        Some(json!({ "errors": errors })),
    )
}

pub fn field_errors_json(errors: &[FieldError]) -> Vec<serde_json::Value> {
    errors.iter().map(|e| json!(e)).collect()
}
