//! Server-side validation for the login and registration forms.
//!
//! Validation runs before any call to the remote API; a form that fails
//! here is re-rendered with field errors and never leaves the process.

use serde::Deserialize;

/// Login form fields.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Registration form fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// One failed field with a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl LoginForm {
    /// Empty when the form may be submitted to the API.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if !is_valid_email(&self.email) {
            errors.push(FieldError::new("email", "Enter a valid email address."));
        }
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "Password is required."));
        }
        errors
    }
}

impl RegisterForm {
    /// Empty when the form may be submitted to the API.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.chars().count() < 2 || name.chars().count() > 80 {
            errors.push(FieldError::new(
                "name",
                "Name must be between 2 and 80 characters.",
            ));
        }
        if !is_valid_email(&self.email) {
            errors.push(FieldError::new("email", "Enter a valid email address."));
        }
        if let Some(message) = password_problem(&self.password) {
            errors.push(FieldError::new("password", message));
        }
        errors
    }
}

/// Minimal structural check: one `@`, non-empty local part, dotted domain.
fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && domain.contains('.') && !domain.ends_with('.')
}

/// Passwords need 8-64 characters spanning lower, upper, digit, and symbol.
fn password_problem(password: &str) -> Option<&'static str> {
    let length = password.chars().count();
    if !(8..=64).contains(&length) {
        return Some("Password must be between 8 and 64 characters.");
    }

    let mut lower = false;
    let mut upper = false;
    let mut digit = false;
    let mut symbol = false;
    for c in password.chars() {
        if c.is_ascii_lowercase() {
            lower = true;
        } else if c.is_ascii_uppercase() {
            upper = true;
        } else if c.is_ascii_digit() {
            digit = true;
        } else {
            symbol = true;
        }
    }
    if lower && upper && digit && symbol {
        None
    } else {
        Some("Password must include lowercase, uppercase, a digit, and a symbol.")
    }
}
