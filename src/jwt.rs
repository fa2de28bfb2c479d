use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;

const DEFAULT_EXP_HOURS: i64 = 24;

/// HS256 bearer-token settings.
#[derive(Clone)]
pub struct JwtConfig {
    secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("exp_hours", &self.exp_hours)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(DEFAULT_EXP_HOURS))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self::new(secret, exp_hours))
    }

    /// Issues a token whose subject is `user_id`.
    pub fn encode(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::unauthorized(format!("invalid token: {}", err)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// Authenticated identity of the request. Authorization is decided per
/// operation by the permission services, never by the token itself.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let claims = state.jwt.decode(token)?;

        Ok(Caller { user_id: claims.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_subject() {
        let jwt = JwtConfig::new("unit-test-secret", 1);
        let user = Uuid::new_v4();
        let token = jwt.encode(user).unwrap();
        assert_eq!(jwt.decode(&token).unwrap().sub, user);
    }

    #[test]
    fn foreign_signature_is_unauthorized() {
        let token = JwtConfig::new("one", 1).encode(Uuid::new_v4()).unwrap();
        let err = JwtConfig::new("two", 1).decode(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = JwtConfig::new("unit-test-secret", -2);
        let token = jwt.encode(Uuid::new_v4()).unwrap();
        assert!(jwt.decode(&token).is_err());
    }
}
