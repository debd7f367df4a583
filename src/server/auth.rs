//! Bearer identity for the HTTP surface.
//!
//! The authentication provider itself is external; this module only verifies
//! the bearer token it issued, through the narrow [`IdentityVerifier`] seam.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::AppState;
use crate::{AppError, AppResult};

/// The verified caller identity attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
}

pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> AppResult<Identity>;
}

/// Token payload. `sub` carries the uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
}

/// HS256 verifier for tokens minted by the external auth provider.
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier").finish_non_exhaustive()
    }
}

impl JwtVerifier {
    pub fn new(secret: &str) -> AppResult<Self> {
        if secret.len() < 32 {
            return Err(AppError::new(
                "AUTH/WEAK_SECRET",
                "JWT secret must be at least 32 characters",
            ));
        }
        Ok(Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        })
    }

    /// Mint a token for `uid`. Exists for local tooling and tests; production
    /// tokens come from the auth provider.
    pub fn issue(&self, uid: &str, ttl_secs: u64) -> AppResult<String> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| AppError::new("AUTH/CLOCK", e.to_string()))?
            .as_secs();
        let claims = Claims {
            sub: uid.to_string(),
            exp: now + ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::new("AUTH/TOKEN_MINT", e.to_string()))
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> AppResult<Identity> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            AppError::new("AUTH/INVALID_TOKEN", "Bearer token rejected")
                .with_context("reason", e.to_string())
        })?;
        Ok(Identity {
            uid: data.claims.sub,
        })
    }
}

/// Fixed-map verifier for tests: token string -> uid.
pub struct StaticVerifier {
    tokens: std::collections::HashMap<String, String>,
}

impl StaticVerifier {
    pub fn new(tokens: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }
}

impl IdentityVerifier for StaticVerifier {
    fn verify(&self, token: &str) -> AppResult<Identity> {
        self.tokens
            .get(token)
            .map(|uid| Identity { uid: uid.clone() })
            .ok_or_else(|| AppError::new("AUTH/INVALID_TOKEN", "Bearer token rejected"))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let unauthorized = |message: &str| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": false, "error": message })),
            )
        };

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing bearer token"))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Missing bearer token"))?;

        state.verifier.verify(token).map_err(|err| {
            tracing::warn!(target = "larder", event = "auth_rejected", code = %err.code());
            unauthorized("Invalid bearer token")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip_recovers_uid() {
        let verifier = JwtVerifier::new("0123456789abcdef0123456789abcdef").expect("verifier");
        let token = verifier.issue("user-1", 60).expect("token");
        let identity = verifier.verify(&token).expect("verify");
        assert_eq!(identity.uid, "user-1");
    }

    #[test]
    fn expired_token_is_rejected() {
        let verifier = JwtVerifier::new("0123456789abcdef0123456789abcdef").expect("verifier");
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = Claims {
            sub: "user-1".into(),
            exp: now - 120,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("0123456789abcdef0123456789abcdef".as_bytes()),
        )
        .unwrap();
        let err = verifier.verify(&token).unwrap_err();
        assert_eq!(err.code(), "AUTH/INVALID_TOKEN");
    }

    #[test]
    fn weak_secret_is_refused() {
        let err = JwtVerifier::new("short").unwrap_err();
        assert_eq!(err.code(), "AUTH/WEAK_SECRET");
    }

    #[test]
    fn garbage_token_is_rejected() {
        let verifier = JwtVerifier::new("0123456789abcdef0123456789abcdef").expect("verifier");
        assert!(verifier.verify("not-a-jwt").is_err());
    }
}
