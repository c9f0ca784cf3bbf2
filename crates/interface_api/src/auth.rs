//! Authentication and authorization

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claims carried by status API callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Subject (service or user ID)
    pub sub: String,
    /// Granted roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing permission: {0}")]
    MissingPermission(String),
}

/// Creates a signed token, used by operators and tests
pub fn create_token(
    subject: &str,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: i64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs);

    let claims = AuthClaims {
        sub: subject.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a token's signature and expiry
pub fn validate_token(token: &str, secret: &str) -> Result<AuthClaims, AuthError> {
    decode::<AuthClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

/// Checks if the caller holds a role; `admin` holds every role
pub fn has_role(claims: &AuthClaims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| r == required_role || r == "admin")
}

pub fn require_role(claims: &AuthClaims, required_role: &str) -> Result<(), AuthError> {
    if has_role(claims, required_role) {
        Ok(())
    } else {
        Err(AuthError::MissingPermission(required_role.to_string()))
    }
}

/// Permission definitions
pub mod permissions {
    pub const ACCUMULATION_READ: &str = "accumulation:read";
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let token = create_token("recon-tool", vec![permissions::ACCUMULATION_READ.to_string()], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "recon-tool");
        assert!(require_role(&claims, permissions::ACCUMULATION_READ).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("recon-tool", vec![], SECRET, 60).unwrap();
        assert_eq!(validate_token(&token, "other").unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_expired_token() {
        let token = create_token("recon-tool", vec![], SECRET, -3600).unwrap();
        assert_eq!(validate_token(&token, SECRET).unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn test_admin_holds_every_role() {
        let claims = AuthClaims {
            sub: "ops".to_string(),
            roles: vec!["admin".to_string()],
            exp: 0,
            iat: 0,
        };
        assert!(has_role(&claims, permissions::ACCUMULATION_READ));
        let none = AuthClaims { roles: vec![], ..claims };
        assert!(matches!(
            require_role(&none, permissions::ACCUMULATION_READ),
            Err(AuthError::MissingPermission(_))
        ));
    }
}
