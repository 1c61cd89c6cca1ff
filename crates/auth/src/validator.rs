//! Token verification.
//!
//! Signature checks go through `jsonwebtoken`; the time window is checked by
//! [`validate_claims`] so it uses the caller's clock and claim names.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::{JwtClaims, TokenValidationError, validate_claims};

pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HMAC-SHA256 shared-secret validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry lives in `expires_at`, not the registered `exp` claim.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(&secret),
            validation,
        }
    }
}

impl std::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "bearer token rejected");
                TokenValidationError::Malformed(e.to_string())
            })?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use walletd_core::AccountId;

    fn mint(secret: &str, claims: &JwtClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(ttl: Duration) -> JwtClaims {
        let now = Utc::now();
        JwtClaims {
            sub: AccountId::new(),
            roles: vec![Role::admin()],
            issued_at: now - Duration::seconds(1),
            expires_at: now + ttl,
        }
    }

    #[test]
    fn accepts_token_signed_with_the_secret() {
        let c = claims(Duration::minutes(10));
        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        let decoded = validator.validate(&mint("s3cret", &c), Utc::now()).unwrap();
        assert_eq!(decoded, c);
    }

    #[test]
    fn rejects_wrong_secret_and_garbage() {
        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        let token = mint("other", &claims(Duration::minutes(10)));
        assert!(matches!(
            validator.validate(&token, Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
        assert!(matches!(
            validator.validate("not-a-token", Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let c = claims(Duration::minutes(10));
        let validator = Hs256JwtValidator::new(b"s3cret".to_vec());
        let later = Utc::now() + Duration::minutes(11);
        assert_eq!(
            validator.validate(&mint("s3cret", &c), later),
            Err(TokenValidationError::Expired)
        );
    }
}
