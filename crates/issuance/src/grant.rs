//! Pre-authorized code and transaction code (PIN) issuance
//!
//! A grant binds a random pre-authorized code and a short numeric PIN to a
//! credential ID. Grants are persisted under the SHA-256 digest of the code
//! and carry only the digest of the PIN, so the store never holds a
//! redeemable secret. The secrets handed back to the caller live in
//! [`SecretString`]s, which redact themselves in `Debug` and zeroize on drop.
//!
//! Redemption takes the grant out of the store before checking anything.
//! Every attempt against a known code therefore consumes it, whether the PIN
//! matched or not. A holder who mistypes the PIN must request a new grant;
//! in exchange, a short PIN cannot be brute-forced within the grant's TTL.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

use crate::core::{Clock, CredentialId, IssuanceError, Result};
use crate::traits::EphemeralStore;

/// Random bytes per pre-authorized code (256 bits)
const CODE_BYTES: usize = 32;

/// Freshly issued grant, handed to the caller for out-of-band delivery
///
/// Read the secrets with [`ExposeSecret::expose_secret`] at the point they
/// leave the process.
#[derive(Debug, Clone)]
pub struct PreAuthorizationGrant {
    /// High-entropy single-use code
    pub pre_authorized_code: SecretString,
    /// Numeric PIN delivered on a separate channel
    pub tx_code: SecretString,
    /// Credential the grant redeems for
    pub credential_id: CredentialId,
    /// End of the grant's lifetime
    pub expires_at: DateTime<Utc>,
}

/// What the store keeps for a grant
#[derive(Debug, Serialize, Deserialize)]
struct StoredGrant {
    credential_id: CredentialId,
    tx_code_digest: String,
    expires_at: DateTime<Utc>,
}

/// Mints and redeems pre-authorization grants
#[derive(Clone)]
pub struct PreAuthorizedCodeIssuer {
    store: Arc<dyn EphemeralStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    tx_code_length: usize,
}

impl PreAuthorizedCodeIssuer {
    /// Create an issuer producing grants valid for `ttl` with PINs of
    /// `tx_code_length` digits
    pub fn new(
        store: Arc<dyn EphemeralStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        tx_code_length: usize,
    ) -> Self {
        Self {
            store,
            clock,
            ttl,
            tx_code_length,
        }
    }

    /// Mint a grant for `credential_id`
    ///
    /// Store failures surface as [`IssuanceError::GrantCreation`] and are
    /// not retried.
    #[instrument(skip(self, credential_id), fields(credential_id = %credential_id))]
    pub async fn issue(
        &self,
        process_id: &str,
        credential_id: &CredentialId,
    ) -> Result<PreAuthorizationGrant> {
        let pre_authorized_code = generate_code();
        let tx_code = generate_tx_code(self.tx_code_length);
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| IssuanceError::Validation(format!("grant ttl out of range: {e}")))?;
        let expires_at = self.clock.now() + ttl;

        let stored = StoredGrant {
            credential_id: credential_id.clone(),
            tx_code_digest: digest_hex(tx_code.expose_secret()),
            expires_at,
        };
        let value = serde_json::to_value(&stored)
            .map_err(|e| IssuanceError::GrantCreation { source: e.into() })?;

        self.store
            .put(&digest_hex(pre_authorized_code.expose_secret()), value, self.ttl)
            .await
            .map_err(|source| IssuanceError::GrantCreation { source })?;

        info!(%expires_at, "Pre-authorized grant issued");
        Ok(PreAuthorizationGrant {
            pre_authorized_code,
            tx_code,
            credential_id: credential_id.clone(),
            expires_at,
        })
    }

    /// Exchange a code and PIN for the bound credential ID
    ///
    /// Unknown code, wrong PIN, expiry and reuse all fail with the same
    /// [`IssuanceError::InvalidGrant`].
    #[instrument(skip_all)]
    pub async fn redeem(&self, pre_authorized_code: &str, tx_code: &str) -> Result<CredentialId> {
        let Some(value) = self.store.take(&digest_hex(pre_authorized_code)).await? else {
            return Err(reject());
        };
        let stored: StoredGrant = serde_json::from_value(value).map_err(|_| reject())?;

        let supplied = digest_hex(tx_code);
        let pin_matches: bool = stored
            .tx_code_digest
            .as_bytes()
            .ct_eq(supplied.as_bytes())
            .into();
        let unexpired = stored.expires_at > self.clock.now();

        if pin_matches && unexpired {
            info!(credential_id = %stored.credential_id, "Pre-authorized grant redeemed");
            Ok(stored.credential_id)
        } else {
            Err(reject())
        }
    }
}

fn reject() -> IssuanceError {
    warn!(target: "security", "Pre-authorized grant rejected");
    IssuanceError::InvalidGrant
}

fn digest_hex(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn generate_code() -> SecretString {
    let bytes: [u8; CODE_BYTES] = rand::random();
    SecretString::from(URL_SAFE_NO_PAD.encode(bytes))
}

fn generate_tx_code(length: usize) -> SecretString {
    let mut rng = rand::rng();
    let pin: String = (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect();
    SecretString::from(pin)
}
