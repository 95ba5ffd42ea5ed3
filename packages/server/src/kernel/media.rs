use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};

use crate::kernel::traits::BaseMediaStore;

/// Digest-signed, expiring URLs for photo blobs.
///
/// The media host verifies `sig` against the same secret before serving the
/// object. Object storage itself is an external collaborator.
pub struct SignedUrlService {
    base_url: String,
    secret: String,
}

impl SignedUrlService {
    pub fn new(base_url: String, secret: String) -> Self {
        Self { base_url, secret }
    }

    fn signature(&self, path: &str, expires_epoch: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(path.as_bytes());
        hasher.update(b":");
        hasher.update(expires_epoch.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl BaseMediaStore for SignedUrlService {
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String> {
        let expires_epoch = (Utc::now() + ttl).timestamp();
        let sig = self.signature(path, expires_epoch);
        Ok(format!(
            "{}/{}?exp={}&sig={}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/'),
            expires_epoch,
            sig
        ))
    }
}
