use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use ultrablue::{DEFAULT_LOG_LEVEL, RESPONSE_CHR_UUID};
use ultrablue_server::config::{read_secret_file, REDACTED};
use ultrablue_server::server::{init_tracing, AttestationService, LoopbackTransport, SessionVerdict};
use ultrablue_server::{PcrBackend, ServiceConfig};

/// Command line arguments for the Ultrablue server
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start in enrollment mode: the response characteristic discloses the
    /// secret the verifier will send back after a successful attestation
    #[arg(long)]
    enroll: bool,

    /// Hex-encoded 32-byte enrollment secret
    #[arg(long, conflicts_with = "secret_file")]
    secret: Option<String>,

    /// File holding the hex-encoded enrollment secret
    #[arg(long)]
    secret_file: Option<PathBuf>,

    /// Measurement backend extended with attestation secrets
    #[arg(long, value_enum)]
    pcr_backend: Option<PcrBackend>,

    /// TCTI used to reach the TPM
    #[arg(long)]
    tcti: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("config", &self.config)
            .field("enroll", &self.enroll)
            .field("secret", &self.secret.as_ref().map(|_| REDACTED))
            .field("secret_file", &self.secret_file)
            .field("pcr_backend", &self.pcr_backend)
            .field("tcti", &self.tcti)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Args {
    fn into_config(self) -> Result<ServiceConfig> {
        let mut config = match &self.config {
            Some(path) => ServiceConfig::from_file(path)?,
            None => ServiceConfig::default(),
        };
        config.enroll |= self.enroll;
        if let Some(path) = &self.secret_file {
            config.secret = Some(read_secret_file(path)?);
        }
        if let Some(secret) = self.secret {
            config.secret = Some(secret);
        }
        if let Some(backend) = self.pcr_backend {
            config.pcr_backend = backend;
        }
        if let Some(tcti) = self.tcti {
            config.tcti = tcti;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = args.into_config()?;
    info!("Starting with {} PCR backend", config.pcr_backend);
    let mut service = AttestationService::builder().with_config(config).build()?;

    info!("Bench transport on stdin, e.g. `write {RESPONSE_CHR_UUID} 00`");
    let mut transport = LoopbackTransport::stdio();
    let code = tokio::select! {
        verdict = service.run(&mut transport) => exit_code(&verdict),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            SessionVerdict::Disconnected.exit_code()
        }
    };
    service.enrollment().finish();

    std::process::exit(code);
}

/// A transport failure ends the session like a reported error; `run` has
/// already logged it.
fn exit_code(verdict: &Result<SessionVerdict>) -> i32 {
    verdict
        .as_ref()
        .map_or(SessionVerdict::ERROR_CODE, SessionVerdict::exit_code)
}
