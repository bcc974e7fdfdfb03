//! Wire format of the attestation response written to the response characteristic.
//!
//! | bytes                   | meaning                              |
//! |-------------------------|--------------------------------------|
//! | exactly 32 bytes        | bare secret                          |
//! | `0x00`                  | attestation accepted, no secret      |
//! | `0x01` + 32 bytes       | attestation accepted, secret follows |
//! | `0x02`                  | verifier rejected the attestation    |
//!
//! Length is checked before the tag, so a 32-byte write is always a bare secret.

use crate::errors::PayloadError;
use crate::secret::{Secret, SECRET_SIZE};
use std::fmt;

/// Attestation accepted, no secret follows.
pub const TAG_NO_SECRET: u8 = 0x00;
/// Attestation accepted, a [`SECRET_SIZE`]-byte secret follows.
pub const TAG_SECRET: u8 = 0x01;
/// The verifier rejected the attestation.
pub const TAG_REJECTED: u8 = 0x02;

/// Number of PCRs in a TPM 2.0 PC-client bank.
pub const PCR_COUNT: usize = 24;

/// Register extended with attestation secrets.
pub const ATTESTATION_PCR: PcrIndex = PcrIndex(9);

/// Index of a platform configuration register, always below [`PCR_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PcrIndex(u8);

impl PcrIndex {
    /// `None` when `index` is outside the bank.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < PCR_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PcrIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PCR{}", self.0)
    }
}

/// A decoded attestation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationResponse {
    /// Attestation accepted, nothing to bind into device state.
    NoSecret,
    /// Attestation accepted; the secret is folded into [`ATTESTATION_PCR`].
    Secret(Secret),
    /// The verifier did not accept the attestation.
    Rejected,
}

impl AttestationResponse {
    /// Decodes a raw write. See the module docs for the accepted layouts.
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        if payload.len() == SECRET_SIZE {
            return Self::secret_from(payload);
        }
        let (&tag, body) = payload.split_first().ok_or(PayloadError::Empty)?;
        match tag {
            TAG_NO_SECRET if body.is_empty() => Ok(Self::NoSecret),
            TAG_REJECTED if body.is_empty() => Ok(Self::Rejected),
            TAG_SECRET if body.len() == SECRET_SIZE => Self::secret_from(body),
            TAG_NO_SECRET | TAG_REJECTED | TAG_SECRET => Err(PayloadError::InvalidLength {
                tag,
                len: payload.len(),
            }),
            other => Err(PayloadError::UnknownTag(other)),
        }
    }

    /// Tagged encoding, as sent by a verifier.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::NoSecret => vec![TAG_NO_SECRET],
            Self::Rejected => vec![TAG_REJECTED],
            Self::Secret(secret) => {
                let mut out = Vec::with_capacity(1 + SECRET_SIZE);
                out.push(TAG_SECRET);
                out.extend_from_slice(secret.as_ref());
                out
            }
        }
    }

    fn secret_from(bytes: &[u8]) -> Result<Self, PayloadError> {
        let secret = Secret::from_slice(bytes).map_err(|_| PayloadError::InvalidLength {
            tag: TAG_SECRET,
            len: bytes.len(),
        })?;
        Ok(Self::Secret(secret))
    }
}

/// How a write to the response characteristic was handled.
///
/// This is not the attestation verdict, which the verifier computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseOutcome {
    /// A secret was received and extended into the attestation PCR.
    Extended,
    /// The response carried no secret.
    NoSecret,
    /// The verifier rejected the attestation.
    Rejected,
}

impl ResponseOutcome {
    pub const SUCCESS_CODE: i32 = 0;
    pub const REJECTED_CODE: i32 = 1;

    /// Integer result code published to the owning service.
    pub const fn code(self) -> i32 {
        match self {
            Self::Extended | Self::NoSecret => Self::SUCCESS_CODE,
            Self::Rejected => Self::REJECTED_CODE,
        }
    }
}

impl fmt::Display for ResponseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Extended => "secret extended",
            Self::NoSecret => "no secret",
            Self::Rejected => "attestation rejected",
        };
        write!(f, "{label} (code {})", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_secret() {
        let payload = [7u8; 32];
        assert_eq!(
            AttestationResponse::decode(&payload).unwrap(),
            AttestationResponse::Secret(Secret::new(payload))
        );
    }

    #[test]
    fn test_bare_secret_wins_over_tag() {
        // a 32-byte write starting with a tag byte is still a bare secret
        let mut payload = [0u8; 32];
        payload[1] = 0xff;
        assert!(matches!(
            AttestationResponse::decode(&payload),
            Ok(AttestationResponse::Secret(_))
        ));
    }

    #[test]
    fn test_tagged_frames() {
        assert_eq!(
            AttestationResponse::decode(&[TAG_NO_SECRET]).unwrap(),
            AttestationResponse::NoSecret
        );
        assert_eq!(
            AttestationResponse::decode(&[TAG_REJECTED]).unwrap(),
            AttestationResponse::Rejected
        );

        let secret = Secret::new([0x5a; 32]);
        let encoded = AttestationResponse::Secret(secret.clone()).encode();
        assert_eq!(encoded.len(), 33);
        assert_eq!(
            AttestationResponse::decode(&encoded).unwrap(),
            AttestationResponse::Secret(secret)
        );
    }

    #[test]
    fn test_malformed() {
        assert_eq!(AttestationResponse::decode(&[]), Err(PayloadError::Empty));

        let truncated = [TAG_SECRET, 1, 2, 3];
        assert_eq!(
            AttestationResponse::decode(&truncated),
            Err(PayloadError::InvalidLength { tag: TAG_SECRET, len: 4 })
        );

        let trailing = [TAG_NO_SECRET, 0];
        assert_eq!(
            AttestationResponse::decode(&trailing),
            Err(PayloadError::InvalidLength { tag: TAG_NO_SECRET, len: 2 })
        );

        assert_eq!(
            AttestationResponse::decode(&[0x7f]),
            Err(PayloadError::UnknownTag(0x7f))
        );
        assert!(AttestationResponse::decode(&[0u8; 31]).is_err());
        assert!(AttestationResponse::decode(&[1u8; 34]).is_err());
    }

    #[test]
    fn test_pcr_index_bounds() {
        assert_eq!(ATTESTATION_PCR.get(), 9);
        assert_eq!(PcrIndex::new(23).map(PcrIndex::get), Some(23));
        assert!(PcrIndex::new(24).is_none());
        assert_eq!(ATTESTATION_PCR.to_string(), "PCR9");
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(ResponseOutcome::Extended.code(), 0);
        assert_eq!(ResponseOutcome::NoSecret.code(), 0);
        assert_eq!(ResponseOutcome::Rejected.code(), 1);
    }
}
