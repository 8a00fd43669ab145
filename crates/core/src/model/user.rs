use crate::config::MIN_PASSWORD_LEN;
use crate::document::{Document, FieldValue, Fields};
use crate::filter_types::Projection;
use crate::model::bootcamp::EMAIL_RE;
use crate::model::{ModelError, Violations};
use serde::Deserialize;

/// Field holding the password hash. Never rendered.
pub const PASSWORD_FIELD: &str = "password";

/// Roles a client may register with. `admin` is assigned out of band.
pub const SELF_ASSIGNABLE_ROLES: [&str; 2] = ["user", "publisher"];

/// Registration request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

pub fn validate_registration(input: &RegisterInput) -> Result<(), ModelError> {
    let mut v = Violations::default();
    v.check(
        input.name.as_deref().is_some_and(|n| !n.trim().is_empty()),
        "Please add a name",
    );
    match &input.email {
        Some(email) => v.check(EMAIL_RE.is_match(email), "Please add a valid email"),
        None => v.check(false, "Please add an email"),
    }
    match &input.password {
        Some(password) => v.check(
            password.chars().count() >= MIN_PASSWORD_LEN,
            "Password must be at least 6 characters",
        ),
        None => v.check(false, "Please add a password"),
    }
    if let Some(role) = &input.role {
        v.check(
            SELF_ASSIGNABLE_ROLES.contains(&role.as_str()),
            "Role must be user or publisher",
        );
    }
    v.into_result()
}

/// Fields of a new user. `password_hash` replaces the plaintext password.
pub fn create_fields(input: RegisterInput, password_hash: String) -> Result<Fields, ModelError> {
    validate_registration(&input)?;
    let mut fields = Fields::new();
    if let Some(name) = input.name {
        fields.insert("name".into(), FieldValue::String(name.trim().to_string()));
    }
    if let Some(email) = input.email {
        fields.insert("email".into(), FieldValue::String(email.to_lowercase()));
    }
    fields.insert(
        "role".into(),
        FieldValue::String(input.role.unwrap_or_else(|| "user".into())),
    );
    fields.insert(PASSWORD_FIELD.into(), FieldValue::String(password_hash));
    Ok(fields)
}

/// Projection that hides the password hash.
pub fn public_projection() -> Projection {
    Projection::Exclude(vec![PASSWORD_FIELD.to_string()])
}

/// Stored role of a user document, `"user"` when absent.
pub fn role_of(doc: &Document) -> &str {
    doc.fields
        .get("role")
        .and_then(FieldValue::as_str)
        .unwrap_or("user")
}

/// Stored password hash of a user document.
pub fn password_hash_of(doc: &Document) -> Option<&str> {
    doc.fields.get(PASSWORD_FIELD).and_then(FieldValue::as_str)
}
