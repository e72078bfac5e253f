//! Shared test utilities for key source testing.
//!
//! RSA key generation is expensive, so the helpers here hand out clones of
//! a few lazily generated key pairs rather than generating one per test.
//! The module is feature-gated behind `testutil`.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! asperitas-keystore = { path = "../keystore", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use asperitas_keystore::testutil::{CountingKeySource, test_key_pair};
//! ```

use std::{
    sync::{
        Arc, LazyLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use zeroize::Zeroizing;

use crate::{
    error::{KeyError, KeyResult},
    keypair::{DEFAULT_KEY_BITS, KeyPair},
    memory::MemoryKeyStore,
    source::KeySource,
};

static PRIMARY: LazyLock<KeyPair> = LazyLock::new(|| generate("primary"));
static SECONDARY: LazyLock<KeyPair> = LazyLock::new(|| generate("secondary"));

fn generate(name: &str) -> KeyPair {
    KeyPair::generate(DEFAULT_KEY_BITS)
        .unwrap_or_else(|e| panic!("failed to generate {name} test key pair: {e}"))
}

/// Returns a clone of the shared primary test key pair.
#[must_use]
pub fn test_key_pair() -> KeyPair {
    PRIMARY.clone()
}

/// Returns a clone of a second shared test key pair, distinct from
/// [`test_key_pair`].
#[must_use]
pub fn second_test_key_pair() -> KeyPair {
    SECONDARY.clone()
}

/// Builds a [`MemoryKeyStore`] holding [`test_key_pair`] under `kid`.
#[must_use]
pub fn store_with_key(kid: &str) -> MemoryKeyStore {
    let store = MemoryKeyStore::new();
    store.insert(kid, test_key_pair());
    store
}

/// Factory for errors injected by [`CountingKeySource`].
pub type ErrorFactory = fn(&str) -> KeyError;

/// A [`KeySource`] wrapper that counts lookups and can inject latency or
/// failures.
///
/// Useful for asserting how often the cache reaches the underlying source
/// and for exercising error paths.
pub struct CountingKeySource<S> {
    inner: S,
    private_calls: AtomicUsize,
    public_calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    failure: Mutex<Option<ErrorFactory>>,
}

impl<S: KeySource> CountingKeySource<S> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: S) -> Arc<Self> {
        Arc::new(Self {
            inner,
            private_calls: AtomicUsize::new(0),
            public_calls: AtomicUsize::new(0),
            delay: Mutex::new(None),
            failure: Mutex::new(None),
        })
    }

    /// Number of `private_key_pem` calls observed.
    #[must_use]
    pub fn private_calls(&self) -> usize {
        self.private_calls.load(Ordering::SeqCst)
    }

    /// Number of `public_key_pem` calls observed.
    #[must_use]
    pub fn public_calls(&self) -> usize {
        self.public_calls.load(Ordering::SeqCst)
    }

    /// Sleeps for `delay` before every lookup.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Fails every lookup with the error produced by `factory`.
    pub fn set_failure(&self, factory: Option<ErrorFactory>) {
        *self.failure.lock() = factory;
    }

    async fn before_call(&self, kid: &str) -> KeyResult<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = *self.failure.lock();
        match failure {
            Some(factory) => Err(factory(kid)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: KeySource> KeySource for CountingKeySource<S> {
    async fn private_key_pem(&self, kid: &str) -> KeyResult<Zeroizing<String>> {
        self.private_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call(kid).await?;
        self.inner.private_key_pem(kid).await
    }

    async fn public_key_pem(&self, kid: &str) -> KeyResult<String> {
        self.public_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call(kid).await?;
        self.inner.public_key_pem(kid).await
    }
}
