//! Enrollment mode: while enrolling, the response characteristic discloses
//! the secret that the verifier will send back after a successful attestation.

use crate::utils::lock;

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use rand::TryRngCore;
use std::sync::Mutex;
use tracing::info;
use ultrablue::{Secret, SECRET_SIZE};

/// Shared enrollment state. The owning service ends enrollment when the
/// session ends.
#[derive(Debug)]
pub struct Enrollment {
    // `Some` exactly while enrolling; dropping the secret zeroizes it
    secret: Mutex<Option<Secret>>,
}

impl Enrollment {
    /// Enrollment mode, disclosing `secret` on read.
    pub fn enrolling(secret: Secret) -> Self {
        Self {
            secret: Mutex::new(Some(secret)),
        }
    }

    /// Normal operation: reads are refused.
    pub const fn disabled() -> Self {
        Self {
            secret: Mutex::new(None),
        }
    }

    /// Starts enrollment with a fresh secret from the OS RNG.
    pub fn with_random_secret() -> Result<Self> {
        let mut bytes = [0u8; SECRET_SIZE];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("Failed to draw an enrollment secret")?;
        Ok(Self::enrolling(Secret::new(bytes)))
    }

    pub fn is_enrolling(&self) -> bool {
        lock(&self.secret).is_some()
    }

    /// The enrollment secret, or `None` outside enrollment mode.
    pub fn secret(&self) -> Option<Secret> {
        lock(&self.secret).clone()
    }

    /// Leaves enrollment mode. Later reads are refused.
    pub fn finish(&self) {
        if lock(&self.secret).take().is_some() {
            info!("Enrollment finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrollment_lifecycle() {
        let enrollment = Enrollment::enrolling(Secret::new([9; 32]));
        assert!(enrollment.is_enrolling());
        assert_eq!(enrollment.secret(), Some(Secret::new([9; 32])));

        enrollment.finish();
        assert!(!enrollment.is_enrolling());
        assert_eq!(enrollment.secret(), None);

        // idempotent
        enrollment.finish();
    }

    #[test]
    fn test_disabled() {
        assert!(Enrollment::disabled().secret().is_none());
    }

    #[test]
    fn test_random_secrets_differ() {
        let a = Enrollment::with_random_secret().unwrap().secret().unwrap();
        let b = Enrollment::with_random_secret().unwrap().secret().unwrap();
        assert_ne!(a, b);
    }
}
