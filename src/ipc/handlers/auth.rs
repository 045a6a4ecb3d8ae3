use crate::auth::{self, UserProfile};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::validate::RegistrationFields;
use serde_json::json;

fn auth_err(req: &Request, e: &auth::AuthError) -> serde_json::Value {
    let details = match e {
        auth::AuthError::Invalid(fe) => Some(json!({ "errors": [fe] })),
        _ => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}

fn trimmed<'a>(req: &'a Request, key: &str) -> &'a str {
    req.str_param(key).map(str::trim).unwrap_or("")
}

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let fields = RegistrationFields {
        first_name: trimmed(req, "firstName"),
        last_name: trimmed(req, "lastName"),
        username: trimmed(req, "username"),
        email: trimmed(req, "email"),
        contact_number: trimmed(req, "contactNumber"),
        password: req.str_param("password").unwrap_or(""),
    };
    match auth::register(conn, &fields) {
        Ok(user) => ok(&req.id, json!({ "username": user.username })),
        Err(e) => auth_err(req, &e),
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let username = trimmed(req, "username");
    let password = req.str_param("password").unwrap_or("");
    match auth::login(conn, username, password) {
        Ok(user) => ok(&req.id, json!({ "username": user.username })),
        Err(e) => auth_err(req, &e),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match auth::logout(conn) {
        Ok(had_session) => ok(&req.id, json!({ "loggedOut": had_session })),
        Err(e) => auth_err(req, &e),
    }
}

fn handle_current_user(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match auth::current_user(conn) {
        Ok(user) => ok(&req.id, json!({ "user": UserProfile::from(&user) })),
        Err(e) => auth_err(req, &e),
    }
}

fn handle_set_profile_image(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(uri) = req.str_param("uri").filter(|s| !s.trim().is_empty()) else {
        return err(&req.id, "bad_params", "missing uri", None);
    };
    match auth::set_profile_image(conn, uri) {
        Ok(user) => ok(&req.id, json!({ "user": UserProfile::from(&user) })),
        Err(e) => auth_err(req, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.register" => Some(handle_register(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.currentUser" => Some(handle_current_user(state, req)),
        "auth.setProfileImage" => Some(handle_set_profile_image(state, req)),
        _ => None,
    }
}
