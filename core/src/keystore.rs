//! The keystore collaborator: client TLS material and named CA entries.

use crate::error::KeystoreError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// One PEM entry in the keystore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertEntry {
    /// Entry name, used by routes to pin a CA.
    #[serde(default)]
    pub id: String,
    /// PEM data.
    pub data: String,
}

impl CertEntry {
    /// Create an entry.
    #[must_use]
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }
}

/// The key material a dispatch runs with: the router's client key and
/// certificate, plus the CA entries routes may pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keystore {
    /// Client private key, PEM.
    pub key: String,
    /// Client certificate.
    pub cert: CertEntry,
    /// Named CA entries.
    #[serde(default)]
    pub ca: Vec<CertEntry>,
}

impl Keystore {
    /// Look up a CA entry by name.
    #[must_use]
    pub fn ca_entry(&self, id: &str) -> Option<&CertEntry> {
        self.ca.iter().find(|entry| entry.id == id)
    }
}

/// Provider of the keystore. Acquired once per dispatch, read-only.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so the
/// provider can be injected as `Arc<dyn KeystoreProvider>`.
pub trait KeystoreProvider: Send + Sync {
    /// Fetch the current keystore.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoreError::Unavailable`] when the backing store cannot
    /// be reached; the dispatch is abandoned before any route is attempted.
    fn get_keystore(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Keystore, KeystoreError>> + Send + '_>>;
}
