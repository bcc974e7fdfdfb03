use super::PcrExtender;
use crate::utils::lock;

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use tracing::debug;
use ultrablue::{PcrIndex, Secret, PCR_COUNT};

type Register = [u8; 32];

/// A SHA-256 PCR bank kept in memory.
///
/// Registers start zeroed and extend as `new = SHA256(old || digest)`, the
/// same chaining a TPM applies, so expected values can be precomputed.
#[derive(Debug)]
pub struct SoftwarePcrBank {
    registers: Mutex<[Register; PCR_COUNT]>,
}

impl Default for SoftwarePcrBank {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwarePcrBank {
    pub fn new() -> Self {
        Self {
            registers: Mutex::new([[0u8; 32]; PCR_COUNT]),
        }
    }

    pub fn read(&self, index: PcrIndex) -> Register {
        lock(&self.registers)[index.as_usize()]
    }

    /// Value a register holds after extending `current` with `digest`.
    pub fn chain(current: &Register, digest: &[u8]) -> Register {
        let mut hasher = Sha256::new();
        hasher.update(current);
        hasher.update(digest);
        hasher.finalize().into()
    }
}

impl PcrExtender for SoftwarePcrBank {
    fn extend(&self, index: PcrIndex, digest: &Secret) -> Result<()> {
        let mut registers = lock(&self.registers);
        let register = &mut registers[index.as_usize()];
        *register = Self::chain(register, digest.as_ref());
        debug!("{index} extended, now {}", hex::encode(&register[..8]));
        Ok(())
    }
}
