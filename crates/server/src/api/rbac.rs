//! Role-based access control for authenticated routes.
//!
//! Provides a three-tier permission model (`User` < `Publisher` < `Admin`)
//! where each account carries a role. [`required_role`] determines the
//! minimum role needed for a given HTTP method and path, or `None` when the
//! route is public.

use serde::Deserialize;

/// Account role.
///
/// Roles are ordered: `User` < `Publisher` < `Admin`. A publisher can do
/// everything a user can, and an admin can do everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Reads everything public, manages courses and their own account.
    User,
    /// Also creates, edits and deletes bootcamps.
    Publisher,
    /// Assigned out of band; every route.
    Admin,
}

impl Role {
    /// Parse a stored role name. Unknown names fall back to `User`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "admin" => Role::Admin,
            "publisher" => Role::Publisher,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Publisher => "publisher",
            Role::Admin => "admin",
        }
    }
}

/// Determine the minimum role required for a given method + path under
/// `/api/v1`. `None` means no login is needed.
pub fn required_role(method: &str, path: &str) -> Option<Role> {
    let path = path.strip_prefix("/api/v1").unwrap_or(path);
    let path = path.trim_end_matches('/');

    if path == "/auth/me" {
        return Some(Role::User);
    }
    if path.starts_with("/auth/") {
        return None;
    }
    if method == "GET" {
        return None;
    }

    if path.starts_with("/courses") {
        return Some(Role::User);
    }
    if let Some(rest) = path.strip_prefix("/bootcamps") {
        // POST /bootcamps/:id/courses is open to any logged-in user.
        if method == "POST" && rest.ends_with("/courses") {
            return Some(Role::User);
        }
        return Some(Role::Publisher);
    }
    Some(Role::Admin)
}
