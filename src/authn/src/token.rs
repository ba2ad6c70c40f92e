//! Access token validation
//!
//! Verification keys are grouped by algorithm family (HMAC, RSA, EC) and the
//! token header's `alg` picks the family. A token declaring an algorithm
//! with no configured key is rejected with `UnsupportedSigningMethod`.
//! Expiry is checked here rather than inside the JWT library so the rule is
//! explicit: `exp` in the past is `TokenExpired`.

use crate::claims::Claims;
use crate::error::{AuthError, Result};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use monkeys_core::{with_timeout, RevocationStore};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Verification keys by algorithm family
#[derive(Clone, Default)]
pub struct SigningKeys {
    hmac: Option<DecodingKey>,
    rsa: Option<DecodingKey>,
    ec: Option<DecodingKey>,
}

impl SigningKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared secret for HS256/HS384/HS512
    pub fn with_hmac_secret(mut self, secret: &[u8]) -> Self {
        self.hmac = Some(DecodingKey::from_secret(secret));
        self
    }

    /// RSA public key (PEM) for RS* and PS* algorithms
    pub fn with_rsa_pem(mut self, pem: &[u8]) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| AuthError::Configuration(format!("invalid RSA public key: {}", e)))?;
        self.rsa = Some(key);
        Ok(self)
    }

    /// EC public key (PEM) for ES256/ES384
    pub fn with_ec_pem(mut self, pem: &[u8]) -> Result<Self> {
        let key = DecodingKey::from_ec_pem(pem)
            .map_err(|e| AuthError::Configuration(format!("invalid EC public key: {}", e)))?;
        self.ec = Some(key);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.hmac.is_none() && self.rsa.is_none() && self.ec.is_none()
    }

    fn key_for(&self, alg: Algorithm) -> Result<&DecodingKey> {
        let key = match alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => self.hmac.as_ref(),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => self.rsa.as_ref(),
            Algorithm::ES256 | Algorithm::ES384 => self.ec.as_ref(),
            Algorithm::EdDSA => None,
        };
        key.ok_or_else(|| AuthError::UnsupportedSigningMethod(format!("{:?}", alg)))
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("hmac", &self.hmac.is_some())
            .field("rsa", &self.rsa.is_some())
            .field("ec", &self.ec.is_some())
            .finish()
    }
}

/// Token validator configuration
#[derive(Debug, Clone)]
pub struct TokenValidatorConfig {
    /// Required `iss`, if any
    pub issuer: Option<String>,

    /// Required `aud`, if any
    pub audience: Option<String>,

    /// Clock skew tolerated on `exp`
    pub leeway: Duration,

    /// Deadline for the revocation lookup
    pub revocation_timeout: Duration,
}

impl Default for TokenValidatorConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            leeway: Duration::ZERO,
            revocation_timeout: Duration::from_millis(500),
        }
    }
}

/// Verifies signature, expiry and revocation of access tokens
pub struct TokenValidator {
    keys: SigningKeys,
    config: TokenValidatorConfig,
    revocation: Option<Arc<dyn RevocationStore>>,
}

impl TokenValidator {
    /// Fails when no verification key is configured
    pub fn new(keys: SigningKeys, config: TokenValidatorConfig) -> Result<Self> {
        if keys.is_empty() {
            return Err(AuthError::Configuration(
                "at least one token verification key must be configured".to_string(),
            ));
        }

        Ok(Self {
            keys,
            config,
            revocation: None,
        })
    }

    pub fn with_revocation_store(mut self, store: Arc<dyn RevocationStore>) -> Self {
        self.revocation = Some(store);
        self
    }

    /// Validate a raw token and return its claims
    pub async fn validate(&self, token: &str) -> Result<Claims> {
        let claims = self.verify(token)?;
        self.check_revocation(&claims).await?;
        Ok(claims)
    }

    /// Signature, issuer, audience and expiry checks; no I/O
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token)
            .map_err(|e| AuthError::InvalidToken(format!("malformed token header: {}", e)))?;
        let key = self.keys.key_for(header.alg)?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<Claims>(token, key, &validation)
            .map_err(map_jwt_error)?
            .claims;

        let leeway = self.config.leeway.as_secs() as i64;
        if claims.exp.saturating_add(leeway) < Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    /// Revocation lookup; store failures are logged and treated as not revoked
    async fn check_revocation(&self, claims: &Claims) -> Result<()> {
        let (Some(store), Some(session_id)) = (&self.revocation, claims.session_id()) else {
            return Ok(());
        };

        match with_timeout(
            self.config.revocation_timeout,
            "revocation lookup",
            store.is_revoked(session_id),
        )
        .await
        {
            Ok(true) => {
                debug!(session_id, "Rejected revoked session");
                Err(AuthError::TokenRevoked)
            }
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(session_id, error = %e, "Revocation check unavailable, accepting token");
                Ok(())
            }
        }
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAlgorithm => AuthError::UnsupportedSigningMethod(err.to_string()),
        _ => AuthError::InvalidToken(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Audience;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use monkeys_core::InMemoryRevocationStore;

    const SECRET: &[u8] = b"unit-test-secret";

    fn claims(exp_offset: i64) -> Claims {
        Claims {
            user_id: "user-1".to_string(),
            organization_id: "org-1".to_string(),
            jti: Some("session-1".to_string()),
            exp: Utc::now().timestamp() + exp_offset,
            iat: Utc::now().timestamp(),
            ..Default::default()
        }
    }

    fn mint(claims: &Claims, secret: &[u8]) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn validator() -> TokenValidator {
        TokenValidator::new(
            SigningKeys::new().with_hmac_secret(SECRET),
            TokenValidatorConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_a_key() {
        let err = TokenValidator::new(SigningKeys::new(), TokenValidatorConfig::default()).err();
        assert!(matches!(err, Some(AuthError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_valid_token() {
        let token = mint(&claims(3600), SECRET);
        let validated = validator().validate(&token).await.unwrap();
        assert_eq!(validated.user_id, "user-1");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let token = mint(&claims(-10), SECRET);
        assert!(matches!(validator().validate(&token).await, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_leeway_tolerates_small_skew() {
        let validator = TokenValidator::new(
            SigningKeys::new().with_hmac_secret(SECRET),
            TokenValidatorConfig {
                leeway: Duration::from_secs(60),
                ..Default::default()
            },
        )
        .unwrap();
        let token = mint(&claims(-10), SECRET);
        assert!(validator.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let token = mint(&claims(3600), b"someone-else");
        assert!(matches!(validator().validate(&token).await, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_garbage_token() {
        assert!(matches!(validator().validate("not-a-jwt").await, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_declared_algorithm_without_key() {
        // Header {"alg":"RS256","typ":"JWT"}; the signature is never reached
        let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.e30.c2ln";
        assert!(matches!(
            validator().validate(token).await,
            Err(AuthError::UnsupportedSigningMethod(_))
        ));
    }

    #[tokio::test]
    async fn test_issuer_and_audience() {
        let validator = TokenValidator::new(
            SigningKeys::new().with_hmac_secret(SECRET),
            TokenValidatorConfig {
                issuer: Some("monkeys".to_string()),
                audience: Some("monkeys-api".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let mut good = claims(3600);
        good.iss = Some("monkeys".to_string());
        good.aud = Some("monkeys-api".into());
        assert!(validator.validate(&mint(&good, SECRET)).await.is_ok());

        let mut listed = good.clone();
        listed.aud = Some(Audience::Many(vec!["console".to_string(), "monkeys-api".to_string()]));
        assert!(validator.validate(&mint(&listed, SECRET)).await.is_ok());

        let mut other_audience = good.clone();
        other_audience.aud = Some(Audience::Many(vec!["console".to_string()]));
        assert!(matches!(
            validator.validate(&mint(&other_audience, SECRET)).await,
            Err(AuthError::InvalidToken(_))
        ));

        let mut wrong_issuer = good.clone();
        wrong_issuer.iss = Some("elsewhere".to_string());
        assert!(matches!(
            validator.validate(&mint(&wrong_issuer, SECRET)).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_revoked_session() {
        let store = InMemoryRevocationStore::new();
        store.revoke("session-1").await;
        let validator = validator().with_revocation_store(Arc::new(store));

        let token = mint(&claims(3600), SECRET);
        assert!(matches!(validator.validate(&token).await, Err(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn test_revocation_outage_fails_open() {
        let store = InMemoryRevocationStore::new();
        store.revoke("session-1").await;
        store.set_available(false);
        let validator = validator().with_revocation_store(Arc::new(store));

        let token = mint(&claims(3600), SECRET);
        assert!(validator.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_slow_revocation_store_is_bounded() {
        let store = InMemoryRevocationStore::new();
        store.set_latency(Some(Duration::from_secs(5)));
        let validator = TokenValidator::new(
            SigningKeys::new().with_hmac_secret(SECRET),
            TokenValidatorConfig {
                revocation_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        )
        .unwrap()
        .with_revocation_store(Arc::new(store));

        let token = mint(&claims(3600), SECRET);
        let started = std::time::Instant::now();
        assert!(validator.validate(&token).await.is_ok());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
