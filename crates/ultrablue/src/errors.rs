use crate::gatt::AttErrorCode;
use crate::response::PcrIndex;

/// Why an attestation-response payload could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("empty payload")]
    Empty,
    #[error("invalid length {len} for frame tag {tag:#04x}")]
    InvalidLength { tag: u8, len: usize },
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),
}

/// Failures of a single read or write on the response characteristic.
///
/// None of these are fatal to the characteristic. They are reported to the
/// owning service, which decides whether the BLE session ends.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("Malformed attestation response: {0}")]
    MalformedPayload(#[from] PayloadError),

    #[error("Failed to extend {index}: {source}")]
    PcrExtendFailure {
        index: PcrIndex,
        #[source]
        source: anyhow::Error,
    },

    #[error("Read not permitted outside enrollment mode")]
    PermissionDenied,
}

impl ResponseError {
    /// ATT error code sent back to the peer for this failure.
    pub const fn att_error_code(&self) -> AttErrorCode {
        match self {
            Self::MalformedPayload(PayloadError::UnknownTag(_)) => AttErrorCode::VALUE_NOT_ALLOWED,
            Self::MalformedPayload(_) => AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH,
            Self::PcrExtendFailure { .. } => AttErrorCode::UNLIKELY_ERROR,
            Self::PermissionDenied => AttErrorCode::READ_NOT_PERMITTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ATTESTATION_PCR;
    use anyhow::anyhow;

    #[test]
    fn test_att_error_mapping() {
        let err: ResponseError = PayloadError::Empty.into();
        assert_eq!(err.att_error_code(), AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH);

        let err: ResponseError = PayloadError::UnknownTag(0x09).into();
        assert_eq!(err.att_error_code(), AttErrorCode::VALUE_NOT_ALLOWED);

        let err = ResponseError::PcrExtendFailure {
            index: ATTESTATION_PCR,
            source: anyhow!("tpm unavailable"),
        };
        assert_eq!(err.att_error_code(), AttErrorCode::UNLIKELY_ERROR);
        assert_eq!(err.to_string(), "Failed to extend PCR9: tpm unavailable");

        assert_eq!(
            ResponseError::PermissionDenied.att_error_code(),
            AttErrorCode::READ_NOT_PERMITTED
        );
    }
}
