//! Read-through cache of public verification keys.
//!
//! # Architecture
//!
//! ```text
//! token arrives → peek kid
//!              → read-locked probe of the map
//!              → miss? fetch the public PEM from the KeySource (no lock held)
//!              → write-locked insert
//!              → verify signature with the PEM
//! ```
//!
//! Entries are never evicted or expired: a key rotated out of the source
//! stays usable for the life of the process, which keeps outstanding tokens
//! verifiable. Concurrent misses for the same kid may each fetch; the source
//! returns identical material for a kid, so whichever insert lands last
//! leaves the same value behind.

use std::{collections::HashMap, fmt, sync::Arc};

use asperitas_keystore::KeySource;
use fail::fail_point;
use parking_lot::RwLock;

use crate::error::{AuthError, Result};

/// Process-wide kid → public key PEM cache backed by a [`KeySource`].
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    entries: RwLock<HashMap<String, Arc<str>>>,
}

impl KeyCache {
    /// Creates an empty cache over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self { source, entries: RwLock::new(HashMap::new()) }
    }

    /// Returns the public key PEM for `kid`, fetching it from the source on
    /// a miss.
    ///
    /// Failed lookups leave no entry behind.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyLookup`] wrapping the source error.
    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, kid: &str) -> Result<Arc<str>> {
        if let Some(pem) = self.get(kid) {
            tracing::debug!("cache hit");
            return Ok(pem);
        }
        tracing::debug!("cache miss");

        fail_point!("key-cache-before-fetch", |_| {
            Err(AuthError::key_lookup(
                kid,
                asperitas_keystore::KeyError::internal("injected failure before key fetch"),
            ))
        });

        let pem = match self.source.public_key_pem(kid).await {
            Ok(pem) => Arc::<str>::from(pem),
            Err(err) => {
                tracing::warn!(error = %err, transient = err.is_transient(), "public key lookup failed");
                return Err(AuthError::key_lookup(kid, err));
            },
        };

        self.entries.write().insert(kid.to_owned(), Arc::clone(&pem));
        tracing::debug!("cache populated");
        Ok(pem)
    }

    /// Returns the cached PEM for `kid` without consulting the source.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<Arc<str>> {
        self.entries.read().get(kid).cloned()
    }

    /// Returns `true` if `kid` is cached.
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.entries.read().contains_key(kid)
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Cached key ids, sorted.
    #[must_use]
    pub fn kids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.entries.read().keys().cloned().collect();
        kids.sort();
        kids
    }
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache").field("kids", &self.kids()).finish_non_exhaustive()
    }
}
