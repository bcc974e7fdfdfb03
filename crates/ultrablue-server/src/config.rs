use crate::pcr::PcrBackend;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use ultrablue::{Secret, DEFAULT_TCTI};

/// Service configuration, loaded from a JSON file and overridden from the
/// command line. Missing fields take their defaults.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Start in enrollment mode, with the response characteristic readable.
    pub enroll: bool,
    /// Hex-encoded enrollment secret. A random one is drawn when enrolling without it.
    pub secret: Option<String>,
    pub pcr_backend: PcrBackend,
    pub tcti: String,
}

/// Stands in for secrets in `Debug` output.
pub const REDACTED: &str = "<redacted>";

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("enroll", &self.enroll)
            .field("secret", &self.secret.as_ref().map(|_| REDACTED))
            .field("pcr_backend", &self.pcr_backend)
            .field("tcti", &self.tcti)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enroll: false,
            secret: None,
            pcr_backend: PcrBackend::default(),
            tcti: DEFAULT_TCTI.to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// The configured enrollment secret, if any.
    pub fn enrollment_secret(&self) -> Result<Option<Secret>> {
        self.secret
            .as_deref()
            .map(Secret::from_hex)
            .transpose()
            .context("Invalid enrollment secret in configuration")
    }
}

/// Reads a hex-encoded secret from a file, e.g. one provisioned at enrollment time.
pub fn read_secret_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read secret file {}", path.display()))?;
    Ok(raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "enroll": true, "pcr_backend": "software" }}"#).unwrap();

        let config = ServiceConfig::from_file(file.path()).unwrap();
        assert!(config.enroll);
        assert_eq!(config.pcr_backend, PcrBackend::Software);
        assert_eq!(config.tcti, DEFAULT_TCTI);
        assert_eq!(config.enrollment_secret().unwrap(), None);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "pcr": 9 }}"#).unwrap();
        let err = ServiceConfig::from_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_missing_file() {
        assert!(ServiceConfig::from_file("/nonexistent/ultrablue.json").is_err());
    }

    #[test]
    fn test_enrollment_secret() {
        let config = ServiceConfig {
            secret: Some("01".repeat(32)),
            ..Default::default()
        };
        assert_eq!(
            config.enrollment_secret().unwrap(),
            Some(Secret::new([1; 32]))
        );

        let config = ServiceConfig {
            secret: Some("01".into()),
            ..Default::default()
        };
        assert!(config.enrollment_secret().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let secret = "ab".repeat(32);
        let config = ServiceConfig {
            secret: Some(secret.clone()),
            ..Default::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains(&secret));
        assert!(printed.contains(REDACTED));
    }

    #[test]
    fn test_read_secret_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  {}  ", "ff".repeat(32)).unwrap();
        let hex_secret = read_secret_file(file.path()).unwrap();
        assert_eq!(Secret::from_hex(&hex_secret).unwrap(), Secret::new([0xff; 32]));
    }
}
