//! Structured audit logging for security-sensitive operations.
//!
//! Provides [`AuditContext`] (inserted by the auth middleware into request
//! extensions) and [`audit_event`] for emitting structured audit log entries
//! with `target: "audit"`. Operators can route them via `RUST_LOG=audit=info`.

use crate::api::rbac::Role;

/// Identity and request context for audit logging.
///
/// Inserted into request extensions by the auth middleware for every
/// protected route. Handlers extract it via `Option<Extension<AuditContext>>`.
#[derive(Clone, Debug)]
pub struct AuditContext {
    /// Masked account email, or "anonymous".
    pub actor: String,
    /// Role of the account, `None` when anonymous.
    pub role: Option<Role>,
    /// Client IP from `X-Forwarded-For` / `X-Real-IP` headers, or "-".
    pub client_ip: String,
}

impl AuditContext {
    /// Context for requests that reach an audited action without a login
    /// (register, login).
    pub fn anonymous(client_ip: String) -> Self {
        Self {
            actor: "anonymous".into(),
            role: None,
            client_ip,
        }
    }
}

/// Mask an email for safe logging: first two characters of the local part,
/// then the domain.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if local.chars().count() > 2 => {
            let head: String = local.chars().take(2).collect();
            format!("{head}***@{domain}")
        }
        Some((_, domain)) => format!("***@{domain}"),
        None => "***".to_string(),
    }
}

/// Extract client IP from request headers (X-Forwarded-For → X-Real-IP → "-").
pub fn extract_client_ip(headers: &axum::http::HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or("-").trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "-".to_string())
}

/// Emit a structured audit log entry.
pub fn audit_event(ctx: &AuditContext, action: &str, resource: &str, detail: &str, outcome: &str) {
    tracing::info!(
        target: "audit",
        actor = %ctx.actor,
        role = ctx.role.map(|r| r.as_str()).unwrap_or("-"),
        client_ip = %ctx.client_ip,
        action = %action,
        resource = %resource,
        detail = %detail,
        outcome = %outcome,
        "audit"
    );
}
