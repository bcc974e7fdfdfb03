use super::PcrExtender;
use crate::utils::lock;

use anyhow::{anyhow, Context as _, Result};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info};
use tss_esapi::handles::PcrHandle;
use tss_esapi::interface_types::algorithm::HashingAlgorithm;
use tss_esapi::interface_types::session_handles::AuthSession;
use tss_esapi::structures::{Digest, DigestValues};
use tss_esapi::tcti_ldr::TctiNameConf;
use tss_esapi::Context;
use ultrablue::{PcrIndex, Secret};

/// The platform TPM 2.0, extended through ESAPI on the SHA-256 bank.
///
/// An ESAPI context is opened per extension and calls are serialized: the
/// context is not shareable across threads and the resource manager only
/// guarantees ordering per connection.
#[derive(Debug)]
pub struct TpmPcrBank {
    tcti: TctiNameConf,
    extend_mutex: Mutex<()>,
}

impl TpmPcrBank {
    /// Resolves `tcti` (e.g. `device:/dev/tpmrm0`) and checks the TPM answers.
    pub fn new(tcti: &str) -> Result<Self> {
        let conf = TctiNameConf::from_str(tcti)
            .with_context(|| format!("Invalid TCTI configuration {tcti:?}"))?;
        Context::new(conf.clone()).with_context(|| format!("Failed to open TPM at {tcti}"))?;
        info!("TPM PCR bank ready on {tcti}");
        Ok(Self {
            tcti: conf,
            extend_mutex: Mutex::new(()),
        })
    }
}

impl PcrExtender for TpmPcrBank {
    fn extend(&self, index: PcrIndex, digest: &Secret) -> Result<()> {
        let _lock = lock(&self.extend_mutex);

        let handle = PcrHandle::try_from(u32::from(index.get()))
            .map_err(|e| anyhow!("No PCR handle for {index}: {e}"))?;
        let mut values = DigestValues::new();
        values.set(
            HashingAlgorithm::Sha256,
            Digest::try_from(digest.as_ref().to_vec())?,
        );

        let mut context = Context::new(self.tcti.clone()).context("Failed to open TPM")?;
        context
            .execute_with_session(Some(AuthSession::Password), |ctx| {
                ctx.pcr_extend(handle, values)
            })
            .with_context(|| format!("TPM2_PCR_Extend on {index} failed"))?;

        debug!("{index} extended on the TPM");
        Ok(())
    }
}
