//! GATT identifiers and ATT-level codes for the attestation profile.

use std::fmt;
use uuid::Uuid;

/// The Ultrablue attestation primary service.
pub const ULTRABLUE_SERVICE_UUID: Uuid = Uuid::from_u128(0xebee1789_50b3_4943_8396_16c0b7231cad);

/// The response characteristic. The verifier writes its attestation response here.
pub const RESPONSE_CHR_UUID: Uuid = Uuid::from_u128(0xebee1793_50b3_4943_8396_16c0b7231cad);

/// Characteristic properties as carried in the characteristic declaration
/// (Bluetooth Core, Vol 3 Part G, 3.3.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicProperties(u8);

impl CharacteristicProperties {
    /// Value may be read.
    pub const READ: Self = Self(0x02);
    /// Value may be written without response.
    pub const WRITE_WITHOUT_RESPONSE: Self = Self(0x04);
    /// Value may be written with response.
    pub const WRITE: Self = Self(0x08);
    /// Value may be notified.
    pub const NOTIFY: Self = Self(0x10);

    /// Raw property bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Union of two property sets.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for CharacteristicProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// An ATT error code returned to the peer in an Error Response PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttErrorCode(pub u8);

impl AttErrorCode {
    /// The attribute cannot be read.
    pub const READ_NOT_PERMITTED: Self = Self(0x02);
    /// The attribute cannot be written.
    pub const WRITE_NOT_PERMITTED: Self = Self(0x03);
    /// The server does not support the request.
    pub const REQUEST_NOT_SUPPORTED: Self = Self(0x06);
    /// No attribute with that handle or UUID.
    pub const ATTRIBUTE_NOT_FOUND: Self = Self(0x0A);
    /// The value has the wrong length for this attribute.
    pub const INVALID_ATTRIBUTE_VALUE_LENGTH: Self = Self(0x0D);
    /// The request could not be completed for a reason other than the above.
    pub const UNLIKELY_ERROR: Self = Self(0x0E);
    /// The value is not one the attribute accepts.
    pub const VALUE_NOT_ALLOWED: Self = Self(0x13);
}

impl fmt::Display for AttErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_uuid_belongs_to_service_family() {
        let service = ULTRABLUE_SERVICE_UUID.as_fields();
        let response = RESPONSE_CHR_UUID.as_fields();
        assert_eq!(service.1, response.1);
        assert_eq!(service.3, response.3);
        assert_eq!(
            RESPONSE_CHR_UUID.to_string(),
            "ebee1793-50b3-4943-8396-16c0b7231cad"
        );
    }

    #[test]
    fn test_properties_union() {
        let props = CharacteristicProperties::READ | CharacteristicProperties::WRITE;
        assert_eq!(props.bits(), 0x0A);
        assert!(props.contains(CharacteristicProperties::WRITE));
        assert!(!props.contains(CharacteristicProperties::NOTIFY));
    }

    #[test]
    fn test_att_error_display() {
        assert_eq!(AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH.to_string(), "0x0d");
        assert_eq!(AttErrorCode::READ_NOT_PERMITTED.to_string(), "0x02");
    }
}
