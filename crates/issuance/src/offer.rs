//! One-time credential offer cache
//!
//! A wallet receives a URL carrying only a nonce; resolving that nonce hands
//! back the credential offer exactly once. Redemption is a single atomic
//! [`EphemeralStore::take`], so concurrent redeemers of one nonce cannot both
//! succeed.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::core::{IssuanceError, Result};
use crate::traits::EphemeralStore;

/// Random bytes per nonce (128 bits)
const NONCE_BYTES: usize = 16;

/// Stores credential offers under single-use nonces
#[derive(Clone)]
pub struct CredentialOfferCache {
    store: Arc<dyn EphemeralStore>,
    ttl: Duration,
}

impl CredentialOfferCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(store: Arc<dyn EphemeralStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Store an offer and return the nonce that redeems it
    #[instrument(skip_all)]
    pub async fn create(&self, offer: Value) -> Result<String> {
        let nonce = generate_nonce();
        self.store.put(&nonce, offer, self.ttl).await?;
        info!(ttl_secs = self.ttl.as_secs(), "Credential offer cached");
        Ok(nonce)
    }

    /// Redeem a nonce, removing the offer in the same step
    #[instrument(skip_all)]
    pub async fn redeem(&self, nonce: &str) -> Result<Value> {
        match self.store.take(nonce).await? {
            Some(offer) => {
                info!("Credential offer redeemed");
                Ok(offer)
            }
            None => {
                debug!("Credential offer nonce unknown, redeemed, or expired");
                Err(IssuanceError::OfferNotFound)
            }
        }
    }
}

fn generate_nonce() -> String {
    let bytes: [u8; NONCE_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}
