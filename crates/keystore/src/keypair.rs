//! RSA key pair generation and PEM encoding.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey},
    pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding},
};
use zeroize::Zeroizing;

use crate::error::{KeyError, KeyResult};

/// Default modulus size for generated signing keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest modulus accepted for RS256 signing keys.
pub const MIN_KEY_BITS: usize = 2048;

/// An RSA key pair used for RS256 token signing.
///
/// The private half never leaves the key source in parsed form; callers
/// receive PEM text via [`private_pem`](Self::private_pem) and
/// [`public_pem`](Self::public_pem).
#[derive(Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair").field("private", &"<redacted>").finish()
    }
}

impl KeyPair {
    /// Generates a fresh key pair with a modulus of `bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Internal`] if `bits` is below [`MIN_KEY_BITS`] or
    /// key generation fails.
    pub fn generate(bits: usize) -> KeyResult<Self> {
        if bits < MIN_KEY_BITS {
            return Err(KeyError::internal(format!(
                "RSA modulus of {bits} bits is too small (minimum {MIN_KEY_BITS})"
            )));
        }
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| KeyError::internal(format!("generating RSA key: {e}")))?;
        Ok(Self { private })
    }

    /// Parses a private key from PEM text.
    ///
    /// Both PKCS#1 (`RSA PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) encodings
    /// are accepted. `kid` is only used for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKey`] if the text is not an RSA private key.
    pub fn from_private_pem(kid: &str, pem: &str) -> KeyResult<Self> {
        let private = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| KeyError::invalid_key(kid, format!("parsing private key: {e}")))?;
        Ok(Self { private })
    }

    /// Returns the private key as PKCS#1 PEM.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Internal`] if encoding fails.
    pub fn private_pem(&self) -> KeyResult<Zeroizing<String>> {
        self.private
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| KeyError::internal(format!("encoding private key: {e}")))
    }

    /// Returns the public key as PKIX PEM.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Internal`] if encoding fails.
    pub fn public_pem(&self) -> KeyResult<String> {
        RsaPublicKey::from(&self.private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::internal(format!("encoding public key: {e}")))
    }

    /// Writes the pair to `dir` as `private_name` and `public_name`.
    ///
    /// The private key file is created with mode `0600` on Unix. Existing
    /// files are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Io`] if either file cannot be written.
    pub fn write_to(
        &self,
        dir: &Path,
        private_name: &str,
        public_name: &str,
    ) -> KeyResult<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir).map_err(|e| KeyError::io(dir, e))?;

        let private_path = dir.join(private_name);
        let private_pem = self.private_pem()?;
        write_file(&private_path, private_pem.as_bytes(), true)?;

        let public_path = dir.join(public_name);
        write_file(&public_path, self.public_pem()?.as_bytes(), false)?;

        Ok((private_path, public_path))
    }
}

fn write_file(path: &Path, contents: &[u8], private: bool) -> KeyResult<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(path).map_err(|e| KeyError::io(path, e))?;
    file.write_all(contents).map_err(|e| KeyError::io(path, e))
}
