//! Measurement backends that fold attestation secrets into a PCR.

mod software;
#[cfg(feature = "tpm")]
mod tpm;

pub use software::SoftwarePcrBank;
#[cfg(feature = "tpm")]
pub use tpm::TpmPcrBank;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use ultrablue::{PcrIndex, Secret};

/// The platform's PCR-extend primitive.
///
/// Extending is a one-way hash-chain operation: implementations never reset a
/// register and never hand back its previous value. Implementations must be
/// safe to call from several threads; the ones here serialize internally.
pub trait PcrExtender: Send + Sync {
    fn extend(&self, index: PcrIndex, digest: &Secret) -> Result<()>;
}

/// Which measurement backend the service extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PcrBackend {
    /// In-memory SHA-256 bank, for development boards without a TPM.
    Software,
    /// The platform TPM 2.0, reached through a TCTI.
    Tpm,
}

impl Default for PcrBackend {
    fn default() -> Self {
        if cfg!(feature = "tpm") {
            Self::Tpm
        } else {
            Self::Software
        }
    }
}

impl fmt::Display for PcrBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Software => write!(f, "software"),
            Self::Tpm => write!(f, "tpm"),
        }
    }
}

impl PcrBackend {
    /// Opens the backend. `tcti` is only used by [`PcrBackend::Tpm`].
    pub fn open(self, tcti: &str) -> Result<Arc<dyn PcrExtender>> {
        match self {
            Self::Software => {
                warn!("Using the software PCR bank, measurements are not hardware backed");
                Ok(Arc::new(SoftwarePcrBank::new()))
            }
            Self::Tpm => open_tpm(tcti),
        }
    }
}

#[cfg(feature = "tpm")]
fn open_tpm(tcti: &str) -> Result<Arc<dyn PcrExtender>> {
    Ok(Arc::new(TpmPcrBank::new(tcti)?))
}

#[cfg(not(feature = "tpm"))]
fn open_tpm(tcti: &str) -> Result<Arc<dyn PcrExtender>> {
    Err(anyhow::anyhow!(
        "Cannot open TPM at {tcti}: built without the `tpm` feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_serde_names() {
        let backend: PcrBackend = serde_json::from_str("\"software\"").unwrap();
        assert_eq!(backend, PcrBackend::Software);
        assert_eq!(serde_json::to_string(&PcrBackend::Tpm).unwrap(), "\"tpm\"");
        assert_eq!(PcrBackend::Tpm.to_string(), "tpm");
    }

    #[test]
    fn test_open_software() {
        let bank = PcrBackend::Software.open("unused").unwrap();
        bank.extend(ultrablue::ATTESTATION_PCR, &Secret::new([1; 32]))
            .unwrap();
    }

    #[cfg(not(feature = "tpm"))]
    #[test]
    fn test_open_tpm_without_feature() {
        let err = PcrBackend::Tpm.open(ultrablue::DEFAULT_TCTI).err().unwrap();
        assert!(err.to_string().contains("`tpm` feature"));
    }
}
