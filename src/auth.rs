//! Demo login/registration backed by the workspace key-value store.
//!
//! Accounts live under `users` as a JSON array and the session is the
//! username stored under `authToken`. Passwords are kept as entered; this is a
//! gate for the demo UI, not an access-control layer.

use crate::db::{self, KEY_AUTH_TOKEN, KEY_USERS};
use crate::validate::{self, FieldError, RegistrationFields};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub contact_number: String,
    pub password: String,
    #[serde(default)]
    pub profile_image: Option<String>,
}

/// What the profile screen gets to see.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub contact_number: String,
    pub profile_image: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
            contact_number: u.contact_number.clone(),
            profile_image: u.profile_image.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", .0.message)]
    Invalid(FieldError),
    #[error("Username already exists.")]
    UsernameTaken,
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Not logged in. Please log in again.")]
    NotLoggedIn,
    #[error("User not found. Please log in again.")]
    UserNotFound,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Invalid(_) => "validation_failed",
            AuthError::UsernameTaken => "username_taken",
            AuthError::InvalidCredentials => "auth_failed",
            AuthError::NotLoggedIn => "not_logged_in",
            AuthError::UserNotFound => "user_not_found",
            AuthError::Storage(_) => "db_query_failed",
        }
    }
}

fn load_users(conn: &Connection) -> anyhow::Result<Vec<User>> {
    match db::kv_get_json(conn, KEY_USERS)? {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(Vec::new()),
    }
}

fn save_users(conn: &Connection, users: &[User]) -> anyhow::Result<()> {
    db::kv_set_json(conn, KEY_USERS, &serde_json::to_value(users)?)
}

fn session_username(conn: &Connection) -> anyhow::Result<Option<String>> {
    Ok(db::kv_get_json(conn, KEY_AUTH_TOKEN)?.and_then(|v| v.as_str().map(str::to_string)))
}

pub fn register(conn: &Connection, fields: &RegistrationFields<'_>) -> Result<User, AuthError> {
    validate::validate_registration(fields).map_err(AuthError::Invalid)?;

    let mut users = load_users(conn)?;
    if users.iter().any(|u| u.username == fields.username) {
        return Err(AuthError::UsernameTaken);
    }

    let user = User {
        first_name: fields.first_name.to_string(),
        last_name: fields.last_name.to_string(),
        username: fields.username.to_string(),
        email: fields.email.to_string(),
        contact_number: fields.contact_number.to_string(),
        password: fields.password.to_string(),
        profile_image: None,
    };
    users.push(user.clone());
    save_users(conn, &users)?;
    tracing::info!(username = %user.username, "registered user");
    Ok(user)
}

pub fn login(conn: &Connection, username: &str, password: &str) -> Result<User, AuthError> {
    if username.is_empty() || password.is_empty() {
        let field = if username.is_empty() { "username" } else { "password" };
        return Err(AuthError::Invalid(FieldError::new(
            field,
            "required",
            "Please fill in all fields.",
        )));
    }

    let users = load_users(conn)?;
    let Some(user) = users
        .into_iter()
        .find(|u| u.username == username && u.password == password)
    else {
        tracing::debug!(username, "login rejected");
        return Err(AuthError::InvalidCredentials);
    };

    db::kv_set_json(conn, KEY_AUTH_TOKEN, &serde_json::Value::from(username))?;
    tracing::info!(username, "logged in");
    Ok(user)
}

/// Returns whether a session was open.
pub fn logout(conn: &Connection) -> Result<bool, AuthError> {
    Ok(db::kv_remove(conn, KEY_AUTH_TOKEN)?)
}

pub fn current_user(conn: &Connection) -> Result<User, AuthError> {
    let Some(username) = session_username(conn)? else {
        return Err(AuthError::NotLoggedIn);
    };
    load_users(conn)?
        .into_iter()
        .find(|u| u.username == username)
        .ok_or(AuthError::UserNotFound)
}

pub fn set_profile_image(conn: &Connection, uri: &str) -> Result<User, AuthError> {
    let current = current_user(conn)?;
    let mut users = load_users(conn)?;
    let Some(user) = users.iter_mut().find(|u| u.username == current.username) else {
        return Err(AuthError::UserNotFound);
    };
    user.profile_image = Some(uri.to_string());
    let updated = user.clone();
    save_users(conn, &users)?;
    Ok(updated)
}
