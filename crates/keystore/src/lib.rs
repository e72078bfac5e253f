//! # Asperitas Key Store
//!
//! Key sources supplying PEM-encoded RSA key material for token signing and
//! verification, addressed by key id (`kid`).
//!
//! This crate provides:
//! - **[`KeySource`]**: the capability consumed by the token service
//! - **[`MemoryKeyStore`]**: an in-process source, optionally loaded from a directory of
//!   `<kid>.pem` files
//! - **[`KeyPair`]**: RSA key pair generation and PEM encoding (also exposed through the
//!   `genkey` binary)
//!
//! ## Example
//!
//! ```no_run
//! use asperitas_keystore::{KeySource, MemoryKeyStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryKeyStore::from_dir("deploy/keys/")?;
//! let public = store.public_key_pem("54bb2165-71e1-41a6-af3e-7da4a0e1e2c1").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with cached test key pairs and a counting
//!   key source wrapper. Pulls in `tokio` for injected delays.
//! - **`cli`**: Builds the `genkey` binary (`clap`, `tracing-subscriber`).

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Key source error types.
pub mod error;
/// RSA key pair generation.
pub mod keypair;
/// In-memory key source.
pub mod memory;
/// The key source trait.
pub mod source;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;

pub use error::{BoxError, KeyError, KeyResult};
pub use keypair::{DEFAULT_KEY_BITS, KeyPair, MIN_KEY_BITS};
pub use memory::{MAX_KEY_FILE_SIZE, MemoryKeyStore};
pub use source::KeySource;
pub use zeroize::Zeroizing;
