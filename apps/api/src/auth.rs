//! JWT authentication module.
//!
//! Validates bearer tokens issued by the identity provider and exposes the
//! caller to handlers through two extractors:
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//! ┌──────────────┬───────────────────────┬───────────────────────────┐
//! │ header       │ AuthUser              │ MaybeAuthUser             │
//! ├──────────────┼───────────────────────┼───────────────────────────┤
//! │ absent       │ 401                   │ None                      │
//! │ valid token  │ Identity              │ Some(Identity)            │
//! │ bad token    │ 401                   │ 401                       │
//! └──────────────┴───────────────────────┴───────────────────────────┘
//! ```

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::providers::{Identity, IdentityProvider, ProviderError, ProviderResult};
use crate::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the identity provider's user id)
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// HS256 token verifier sharing a secret with the identity provider.
pub struct JwtIdentityProvider {
    secret: String,
}

impl JwtIdentityProvider {
    /// Create a new verifier.
    pub fn new(secret: impl Into<String>) -> Self {
        JwtIdentityProvider {
            secret: secret.into(),
        }
    }

    /// Issue a token for `identity`, valid for `lifetime_secs`.
    ///
    /// SplitPay never issues tokens in production; this serves tests and
    /// local tooling.
    pub fn issue_token(&self, identity: &Identity, lifetime_secs: i64) -> ProviderResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(lifetime_secs);

        let claims = Claims {
            sub: identity.subject.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            phone: identity.phone.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ProviderError::InvalidToken(format!("Failed to issue token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> ProviderResult<Claims> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ProviderError::InvalidToken(e.to_string()))?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(ProviderError::InvalidToken("empty subject".to_string()));
        }

        Ok(token_data.claims)
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn verify(&self, token: &str) -> ProviderResult<Identity> {
        let claims = self.validate_token(token)?;
        Ok(Identity {
            subject: claims.sub,
            name: claims.name,
            email: claims.email,
            phone: claims.phone,
        })
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Reads and verifies the bearer token of a request, if there is one.
fn identify(parts: &Parts, state: &AppState) -> Result<Option<Identity>, ApiError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(extract_bearer_token)
        .ok_or_else(ApiError::unauthorized)?;

    Ok(Some(state.identity.verify(token)?))
}

// =============================================================================
// Extractors
// =============================================================================

/// The authenticated caller. Rejects with 401 when there is none.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        identify(parts, state)?
            .map(AuthUser)
            .ok_or_else(ApiError::unauthorized)
    }
}

/// The caller if authenticated. A token that is present but invalid is
/// still rejected with 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Identity>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        identify(parts, state).map(MaybeAuthUser)
    }
}
