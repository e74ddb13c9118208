use std::sync::{Arc, RwLock};
use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::claims::Claims;
use super::error::CredentialError;
use crate::config::JwtConfig;
use crate::users::directory::AccountDirectory;
use crate::users::repo_types::User;

/// The only algorithm this service signs with or accepts.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Upper bound on token lifetime (30 days).
pub const MAX_TTL_SECONDS: i64 = 30 * 24 * 3600;

/// Source of "now" for issuance and expiry checks, in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Result<Self, CredentialError> {
        if secret.trim().is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

/// Issues and verifies bearer tokens.
///
/// Stateless apart from the signing secret, which lives behind a lock
/// holding an `Arc` so a rotation is one pointer swap: every call sees
/// either the old keys or the new ones, never a mix.
pub struct CredentialService {
    keys: RwLock<Arc<SigningKeys>>,
    issuer: String,
    audience: String,
    ttl_seconds: i64,
    directory_timeout: Duration,
    directory: Arc<dyn AccountDirectory>,
    clock: Arc<dyn Clock>,
}

impl CredentialService {
    pub fn new(
        config: &JwtConfig,
        directory_timeout: Duration,
        directory: Arc<dyn AccountDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CredentialError> {
        if !(1..=MAX_TTL_SECONDS).contains(&config.ttl_seconds) {
            return Err(CredentialError::InvalidTtl(config.ttl_seconds));
        }
        let keys = SigningKeys::from_secret(&config.secret)?;
        Ok(Self {
            keys: RwLock::new(Arc::new(keys)),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl_seconds: config.ttl_seconds,
            directory_timeout,
            directory,
            clock,
        })
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    fn current_keys(&self) -> Arc<SigningKeys> {
        self.keys
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Signs a token for an active user.
    pub fn issue(&self, user: &User) -> Result<String, CredentialError> {
        if !user.is_active {
            warn!(user_id = user.id, "refusing to issue token for inactive user");
            return Err(CredentialError::InvalidSubject);
        }

        let now = self.clock.now();
        let exp = now
            .checked_add(self.ttl_seconds)
            .ok_or_else(|| CredentialError::Signing("expiry out of range".into()))?;
        let claims = Claims {
            sub: user.id.to_string(),
            roles: user.roles.clone(),
            iat: now,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let keys = self.current_keys();
        let token = encode(&Header::new(ALGORITHM), &claims, &keys.encoding)
            .map_err(|e| CredentialError::Signing(e.to_string()))?;
        debug!(user_id = user.id, exp = claims.exp, "token issued");
        Ok(token)
    }

    /// Verifies a token and returns its full claims.
    ///
    /// Expiry is checked against the injected clock with zero leeway.
    pub fn claims(&self, token: &str) -> Result<Claims, CredentialError> {
        let keys = self.current_keys();

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = match decode::<Claims>(token, &keys.decoding, &validation) {
            Ok(data) => data,
            Err(e) => {
                let err = CredentialError::from(e);
                if matches!(err, CredentialError::SignatureInvalid) && self.past_expiry(token) {
                    return Err(CredentialError::Expired);
                }
                return Err(err);
            }
        };
        if self.clock.now() >= data.claims.exp {
            return Err(CredentialError::Expired);
        }
        Ok(data.claims)
    }

    /// Expiry wins over a bad signature: reads `exp` without verifying it.
    /// Only ever turns one rejection into another.
    fn past_expiry(&self, token: &str) -> bool {
        #[derive(Deserialize)]
        struct Expiry {
            exp: i64,
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        decode::<Expiry>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| self.clock.now() >= data.claims.exp)
            .unwrap_or(false)
    }

    /// Verifies a token and returns its subject id.
    ///
    /// Does not consult the directory; callers needing the live account
    /// state use [`CredentialService::authenticate`].
    pub fn validate(&self, token: &str) -> Result<i64, CredentialError> {
        let claims = self.claims(token)?;
        claims
            .sub
            .parse::<i64>()
            .map_err(|_| CredentialError::Malformed)
    }

    /// Replaces the signing secret. Tokens signed under the previous secret
    /// stop verifying immediately. An empty secret is rejected and the
    /// current one stays in effect.
    pub fn rotate_secret(&self, new_secret: &str) -> Result<(), CredentialError> {
        let keys = Arc::new(SigningKeys::from_secret(new_secret)?);
        *self
            .keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = keys;
        info!("signing secret rotated");
        Ok(())
    }

    /// Validates the token, then re-reads the subject from the directory
    /// under the configured timeout and the caller's cancellation token.
    pub async fn authenticate(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<User, CredentialError> {
        let subject = self.validate(token)?;

        let lookup =
            tokio::time::timeout(self.directory_timeout, self.directory.find_by_id(subject));
        let user = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CredentialError::Cancelled),
            res = lookup => res.map_err(|_| CredentialError::DirectoryTimeout)??,
        };

        if !user.is_active {
            return Err(CredentialError::InvalidSubject);
        }
        Ok(user)
    }
}
