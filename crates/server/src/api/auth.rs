//! Password hashing and JWT session tokens.
//!
//! Passwords are hashed with Argon2id. Sessions are HS256 JWTs carrying the
//! user id, accepted either as `Authorization: Bearer <token>` or as the
//! `token` cookie set at login.

use crate::api::rbac::Role;
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Name of the session cookie.
pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("invalid token subject")]
    Subject,

    #[error("invalid expiry '{0}', expected e.g. 30d, 12h, 15m, 60s")]
    Expiry(String),

    #[error("system clock before unix epoch")]
    Clock,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: String,
    /// Issued at, seconds since epoch.
    pub iat: u64,
    /// Expiry, seconds since epoch.
    pub exp: u64,
}

/// The authenticated account, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Token signing and cookie settings.
#[derive(Clone)]
pub struct AuthConfig {
    secret: String,
    expire: Duration,
    cookie_days: u64,
    secure_cookie: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"***")
            .field("expire", &self.expire)
            .field("cookie_days", &self.cookie_days)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

impl AuthConfig {
    /// `expire` uses the `30d` / `12h` / `15m` / `60s` notation; a bare
    /// number is seconds.
    pub fn new(
        secret: impl Into<String>,
        expire: &str,
        cookie_days: u64,
        secure_cookie: bool,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            secret: secret.into(),
            expire: parse_expiry(expire).ok_or_else(|| AuthError::Expiry(expire.to_string()))?,
            cookie_days,
            secure_cookie,
        })
    }

    /// Sign a session token for `user_id`.
    pub fn issue_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let now = unix_now()?;
        let claims = Claims {
            id: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.expire.as_secs()),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Verify signature and expiry, returning the user id.
    pub fn verify_token(&self, token: &str) -> Result<Uuid, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        Uuid::parse_str(&data.claims.id).map_err(|_| AuthError::Subject)
    }

    /// `Set-Cookie` value carrying the session token.
    pub fn cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{TOKEN_COOKIE}={token}; Max-Age={}; Path=/; HttpOnly",
            self.cookie_days.saturating_mul(24 * 60 * 60)
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn unix_now() -> Result<u64, AuthError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| AuthError::Clock)
}

/// Parse `30d`, `12h`, `15m`, `60s` or a bare number of seconds.
pub fn parse_expiry(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&raw[..i], c),
        _ => (raw, 's'),
    };
    let n: u64 = digits.trim().parse().ok()?;
    let secs = match unit {
        'd' => n.checked_mul(24 * 60 * 60)?,
        'h' => n.checked_mul(60 * 60)?,
        'm' => n.checked_mul(60)?,
        's' => n,
        _ => return None,
    };
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// `false` for a wrong password and for a malformed stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Session token from `Authorization: Bearer` or, failing that, the cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if bearer.is_some() {
        return bearer;
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new("test-secret", "30d", 30, false).unwrap()
    }

    #[test]
    fn test_parse_expiry() {
        assert_eq!(parse_expiry("30d"), Some(Duration::from_secs(30 * 86_400)));
        assert_eq!(parse_expiry("12h"), Some(Duration::from_secs(43_200)));
        assert_eq!(parse_expiry("15m"), Some(Duration::from_secs(900)));
        assert_eq!(parse_expiry("3600"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_expiry("0d"), None);
        assert_eq!(parse_expiry("10w"), None);
        assert_eq!(parse_expiry("d"), None);
        assert_eq!(parse_expiry(""), None);
    }

    #[test]
    fn test_token_roundtrip() {
        let cfg = config();
        let id = Uuid::new_v4();
        let token = cfg.issue_token(id).unwrap();
        assert_eq!(cfg.verify_token(&token).unwrap(), id);
    }

    #[test]
    fn test_token_rejects_wrong_secret_and_garbage() {
        let token = config().issue_token(Uuid::new_v4()).unwrap();
        let other = AuthConfig::new("other-secret", "30d", 30, false).unwrap();
        assert!(other.verify_token(&token).is_err());
        assert!(config().verify_token("not.a.token").is_err());
    }

    #[test]
    fn test_token_rejects_expired() {
        let now = unix_now().unwrap();
        let claims = Claims {
            id: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(config().verify_token(&token).is_err());
    }

    #[test]
    fn test_password_hash_verify() {
        let hash = hash_password("123456").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("123456", &hash));
        assert!(!verify_password("1234567", &hash));
        assert!(!verify_password("123456", "not-a-hash"));
    }

    #[test]
    fn test_cookie_flags() {
        let cookie = config().cookie("abc");
        assert!(cookie.starts_with("token=abc;"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
        let secure = AuthConfig::new("s", "1h", 1, true).unwrap();
        assert!(secure.cookie("abc").ends_with("; Secure"));
    }

    #[test]
    fn test_token_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; token=from-cookie".parse().unwrap());
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }
}
