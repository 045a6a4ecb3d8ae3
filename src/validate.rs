use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Value a picker holds before the user has chosen anything.
pub const UNSELECTED: &str = "Select";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex"));

static CONTACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{7,15}$").expect("Invalid contact number regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub code: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
        }
    }
}

fn has_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

pub fn validate_name(name: &str) -> Result<(), FieldError> {
    if name.is_empty() {
        return Err(FieldError::new("name", "required", "Name is required."));
    }
    if has_digit(name) {
        return Err(FieldError::new(
            "name",
            "contains_digit",
            "Name must not contain numbers.",
        ));
    }
    Ok(())
}

pub fn validate_subject(subject: &str) -> Result<(), FieldError> {
    let Some(first) = subject.chars().next() else {
        return Err(FieldError::new("subject", "required", "Subject is required."));
    };
    if !first.is_uppercase() {
        return Err(FieldError::new(
            "subject",
            "not_capitalized",
            "Subject must start with a capital letter.",
        ));
    }
    if has_digit(subject) {
        return Err(FieldError::new(
            "subject",
            "contains_digit",
            "Subject must not contain numbers.",
        ));
    }
    Ok(())
}

/// Range checks happen later, when averages are computed.
pub fn validate_grade(grade: &str) -> Result<(), FieldError> {
    if grade.is_empty() {
        return Err(FieldError::new("grade", "required", "Grade is required."));
    }
    Ok(())
}

pub fn validate_selection(field: &'static str, label: &str, value: &str) -> Result<(), FieldError> {
    if value.is_empty() || value == UNSELECTED {
        return Err(FieldError::new(
            field,
            "not_selected",
            format!("Please select a {}.", label),
        ));
    }
    Ok(())
}

/// Raw values from the submission form. `None` means the form variant has no
/// such picker; a present value is checked against the `Select` placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionFields<'a> {
    pub name: &'a str,
    pub subject: &'a str,
    pub grade: &'a str,
    pub year_level: Option<&'a str>,
    pub course: Option<&'a str>,
}

/// Runs every rule and collects all failures, in form order.
pub fn validate_submission_fields(fields: &SubmissionFields<'_>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let checks = [
        validate_name(fields.name),
        validate_subject(fields.subject),
        validate_grade(fields.grade),
        fields
            .year_level
            .map_or(Ok(()), |v| validate_selection("yearLevel", "year level", v)),
        fields
            .course
            .map_or(Ok(()), |v| validate_selection("course", "course", v)),
    ];
    for check in checks {
        if let Err(e) = check {
            errors.push(e);
        }
    }
    errors
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationFields<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub contact_number: &'a str,
    pub password: &'a str,
}

/// Checks the registration form; stops at the first failing rule.
pub fn validate_registration(fields: &RegistrationFields<'_>) -> Result<(), FieldError> {
    let required = [
        ("firstName", fields.first_name),
        ("lastName", fields.last_name),
        ("username", fields.username),
        ("email", fields.email),
        ("contactNumber", fields.contact_number),
        ("password", fields.password),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.is_empty()) {
        return Err(FieldError::new(*field, "required", "Please fill in all fields."));
    }
    if !EMAIL_RE.is_match(fields.email) {
        return Err(FieldError::new(
            "email",
            "invalid_email",
            "Please enter a valid email address.",
        ));
    }
    if !CONTACT_RE.is_match(fields.contact_number) {
        return Err(FieldError::new(
            "contactNumber",
            "invalid_contact_number",
            "Please enter a valid contact number (7-15 digits).",
        ));
    }
    Ok(())
}
