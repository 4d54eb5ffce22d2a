//! Caller resolution from HS256 bearer tokens.
//!
//! Tokens are minted by the job board's account service; this service only
//! verifies them and reads the subject as the caller's identity. Rejection
//! messages name the failure class but never echo decoder output.

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};

use crate::config::JwtConfig;
use crate::error::AppError;

use super::Claims;

pub struct JwtValidator {
    key: DecodingKey,
    rules: Validation,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Self {
        let mut rules = Validation::new(Algorithm::HS256);
        if let Some(ref issuer) = config.issuer {
            rules.set_issuer(&[issuer]);
        }
        if let Some(ref audience) = config.audience {
            rules.set_audience(&[audience]);
        }

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            rules,
        }
    }

    /// Verify `token` and return its claims
    pub fn claims(&self, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.rules).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidSignature => "Token signature mismatch",
                ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                    "Token not issued for this service"
                }
                ErrorKind::InvalidAlgorithm => "Token algorithm not accepted",
                _ => "Malformed token",
            };
            AppError::Auth(reason.to_string())
        })?;

        Ok(data.claims)
    }

    /// Verify `token` and return the caller identity it was issued to
    pub fn authenticate(&self, token: &str) -> Result<String, AppError> {
        let claims = self.claims(token)?;
        if claims.user_id().trim().is_empty() {
            return Err(AppError::Auth("Token has no subject".to_string()));
        }
        Ok(claims.sub)
    }
}
