//! In-memory key source.
//!
//! [`MemoryKeyStore`] keeps parsed RSA private keys in a map guarded by a
//! reader/writer lock. It can be filled programmatically or loaded from a
//! directory of `<kid>.pem` files at start-up.

use std::{
    collections::HashMap,
    fs,
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::{
    error::{KeyError, KeyResult},
    keypair::KeyPair,
    source::KeySource,
};

/// Largest key file accepted by [`MemoryKeyStore::from_dir`] (1 MiB).
pub const MAX_KEY_FILE_SIZE: u64 = 1024 * 1024;

/// File extension of key files picked up by [`MemoryKeyStore::from_dir`].
pub const KEY_FILE_EXTENSION: &str = "pem";

/// In-memory implementation of [`KeySource`].
///
/// Public keys are derived from the stored private key on every call, so a
/// replaced key pair is reflected immediately.
///
/// # Thread Safety
///
/// Uses [`parking_lot::RwLock`]; lookups only take the read lock.
///
/// # Examples
///
/// ```no_run
/// use asperitas_keystore::{KeyPair, KeySource, MemoryKeyStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryKeyStore::new();
/// store.insert("54bb2165-71e1-41a6-af3e-7da4a0e1e2c1", KeyPair::generate(2048)?);
///
/// let public = store.public_key_pem("54bb2165-71e1-41a6-af3e-7da4a0e1e2c1").await?;
/// assert!(public.starts_with("-----BEGIN PUBLIC KEY-----"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyStore {
    keys: Arc<RwLock<HashMap<String, KeyPair>>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.pem` file below `dir`, keyed by file stem.
    ///
    /// The directory tree is walked recursively. Files with other extensions
    /// are ignored; files larger than [`MAX_KEY_FILE_SIZE`] are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Io`] if the tree cannot be read and
    /// [`KeyError::InvalidKey`] if a `.pem` file does not hold an RSA private
    /// key or exceeds the size limit.
    #[tracing::instrument(skip(dir), fields(dir = %dir.as_ref().display()))]
    pub fn from_dir(dir: impl AsRef<Path>) -> KeyResult<Self> {
        let store = Self::new();
        let mut files = Vec::new();
        collect_key_files(dir.as_ref(), &mut files)?;
        files.sort();

        for path in files {
            let Some(kid) = path.file_stem().and_then(|s| s.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping key file with non UTF-8 name");
                continue;
            };
            let pem = read_key_file(kid, &path)?;
            store.insert_pem(kid, &pem)?;
            tracing::debug!(kid, path = %path.display(), "loaded signing key");
        }

        tracing::info!(keys = store.len(), "key store loaded");
        Ok(store)
    }

    /// Registers `pair` under `kid`, replacing any previous pair.
    pub fn insert(&self, kid: impl Into<String>, pair: KeyPair) {
        self.keys.write().insert(kid.into(), pair);
    }

    /// Parses `pem` and registers it under `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKey`] if `pem` is not an RSA private key.
    pub fn insert_pem(&self, kid: &str, pem: &str) -> KeyResult<()> {
        let pair = KeyPair::from_private_pem(kid, pem)?;
        self.insert(kid, pair);
        Ok(())
    }

    /// Removes the pair registered under `kid`, returning whether one existed.
    pub fn remove(&self, kid: &str) -> bool {
        self.keys.write().remove(kid).is_some()
    }

    /// Returns the registered key ids in sorted order.
    #[must_use]
    pub fn kids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.keys.read().keys().cloned().collect();
        kids.sort();
        kids
    }

    /// Returns the number of registered key pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Returns `true` if no key pairs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    fn pair(&self, kid: &str) -> KeyResult<KeyPair> {
        self.keys.read().get(kid).cloned().ok_or_else(|| KeyError::not_found(kid))
    }
}

#[async_trait]
impl KeySource for MemoryKeyStore {
    #[tracing::instrument(skip(self))]
    async fn private_key_pem(&self, kid: &str) -> KeyResult<Zeroizing<String>> {
        self.pair(kid)?.private_pem()
    }

    #[tracing::instrument(skip(self))]
    async fn public_key_pem(&self, kid: &str) -> KeyResult<String> {
        self.pair(kid)?.public_pem()
    }
}

fn collect_key_files(dir: &Path, files: &mut Vec<PathBuf>) -> KeyResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| KeyError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| KeyError::io(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| KeyError::io(&path, e))?;

        if file_type.is_dir() {
            collect_key_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == KEY_FILE_EXTENSION) {
            files.push(path);
        }
    }
    Ok(())
}

fn read_key_file(kid: &str, path: &Path) -> KeyResult<Zeroizing<String>> {
    let file = fs::File::open(path).map_err(|e| KeyError::io(path, e))?;
    let mut pem = Zeroizing::new(String::new());
    // One extra byte tells an oversized file apart from one exactly at the limit.
    let read = file
        .take(MAX_KEY_FILE_SIZE + 1)
        .read_to_string(&mut pem)
        .map_err(|e| KeyError::io(path, e))?;
    if read as u64 > MAX_KEY_FILE_SIZE {
        return Err(KeyError::invalid_key(
            kid,
            format!("key file exceeds {MAX_KEY_FILE_SIZE} bytes"),
        ));
    }
    Ok(pem)
}
