use crate::calc;
use crate::ipc::error::{err, ok, registry_err};
use crate::ipc::types::{AppState, Request};
use crate::registry::{Grade, RegistryError};
use serde_json::json;

fn handle_college_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grades: Vec<Grade> = if let Some(raw) = req.params.get("grades") {
        match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        }
    } else if let Some(id) = req.str_param("id") {
        match state.registry.get(id) {
            Some(s) => s.grades.clone(),
            None => return registry_err(&req.id, &RegistryError::NotFound(id.to_string())),
        }
    } else {
        return err(&req.id, "bad_params", "missing grades or id", None);
    };

    ok(&req.id, json!(calc::college_average(&grades)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.collegeAverage" => Some(handle_college_average(state, req)),
        _ => None,
    }
}
