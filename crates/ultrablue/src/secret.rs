use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an attestation secret. Matches the SHA-256 PCR bank digest size,
/// so a secret can be folded into a register as-is.
pub const SECRET_SIZE: usize = 32;

/// A secret delivered by the verifier after a successful attestation,
/// or handed out during enrollment.
///
/// Implements [`Zeroize`] and [`ZeroizeOnDrop`] so the bytes are cleared when
/// the value goes away. The [`Debug`] impl never prints the bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_SIZE]);

impl Secret {
    pub const fn new(data: [u8; SECRET_SIZE]) -> Self {
        Self(data)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let data: [u8; SECRET_SIZE] = bytes.try_into().map_err(|_| {
            anyhow!(
                "Invalid secret size: expected {SECRET_SIZE} bytes, got {}",
                bytes.len()
            )
        })?;
        Ok(Self(data))
    }

    /// Parses a hex string, as given on the command line or in a secret file.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(s.trim()).context("Secret is not valid hex")?;
        let secret = Self::from_slice(&bytes);
        bytes.zeroize();
        secret
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short identifier safe to log: the first 8 bytes of SHA-256 over the secret.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..8])
    }
}

impl AsRef<[u8]> for Secret {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self.fingerprint())
    }
}
