use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::JwtConfig, error::ApiError, state::AppState};

/// JWT payload. The subject is kept as a string so a syntactically valid
/// token with a garbage subject is rejected as such, not as malformed.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Why a token was rejected. Each variant carries a distinct detail message
/// so 401 responses tell expiry apart from a bad signature.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    BadSignature,
    #[error("invalid token subject")]
    SubjectInvalid,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig { secret, ttl_hours } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_secs((ttl_hours as u64) * 3600),
        }
    }
}

impl JwtKeys {
    pub fn sign(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            },
        )?;
        let user_id =
            Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::SubjectInvalid)?;
        debug!(user_id = %user_id, "jwt verified");
        Ok(user_id)
    }
}

/// Extracts the bearer token, verifies it, and yields the caller's user id.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Token(TokenError::Malformed))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Token(TokenError::Malformed))?;

        let user_id = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            ApiError::Token(e)
        })?;

        Ok(AuthUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    fn sign_raw(keys: &JwtKeys, claims: &Claims) -> String {
        encode(&Header::default(), claims, &keys.encoding).expect("encode")
    }

    #[tokio::test]
    async fn sign_and_verify_roundtrip() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign(user_id).expect("sign");
        assert_eq!(keys.verify(&token).expect("verify"), user_id);
    }

    #[tokio::test]
    async fn expiry_is_twenty_four_hours() {
        let keys = make_keys();
        assert_eq!(keys.ttl, Duration::from_secs(24 * 3600));
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let past = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            iat: (past - TimeDuration::hours(24)).unix_timestamp() as usize,
            exp: past.unix_timestamp() as usize,
        };
        let token = sign_raw(&keys, &claims);
        let err = keys.verify(&token).unwrap_err();
        assert_eq!(err, TokenError::Expired);
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_secret() {
        let keys = make_keys();
        let other = JwtKeys {
            encoding: EncodingKey::from_secret(b"a-completely-different-signing-key"),
            decoding: DecodingKey::from_secret(b"a-completely-different-signing-key"),
            ttl: Duration::from_secs(3600),
        };
        let token = other.sign(Uuid::new_v4()).expect("sign");
        let err = keys.verify(&token).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
        assert!(err.to_string().contains("signature"));
    }

    #[test]
    fn expired_and_signature_messages_are_distinct() {
        assert_ne!(
            TokenError::Expired.to_string(),
            TokenError::BadSignature.to_string()
        );
    }

    #[tokio::test]
    async fn verify_rejects_garbage() {
        let keys = make_keys();
        assert_eq!(
            keys.verify("not.a.token").unwrap_err(),
            TokenError::Malformed
        );
    }

    #[tokio::test]
    async fn verify_rejects_non_uuid_subject() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: "definitely-not-a-uuid".into(),
            iat: now.unix_timestamp() as usize,
            exp: (now + TimeDuration::hours(1)).unix_timestamp() as usize,
        };
        let token = sign_raw(&keys, &claims);
        assert_eq!(
            keys.verify(&token).unwrap_err(),
            TokenError::SubjectInvalid
        );
    }
}
