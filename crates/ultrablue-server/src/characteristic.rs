use ultrablue::{AttErrorCode, CharacteristicProperties};
use uuid::Uuid;
use zeroize::Zeroizing;

/// A characteristic as seen by the BLE stack adapter: one method per ATT
/// operation. Failures come back as the ATT error code for the peer.
pub trait GattCharacteristic: Send + Sync {
    fn uuid(&self) -> Uuid;

    fn properties(&self) -> CharacteristicProperties;

    fn handle_write(&self, payload: &[u8]) -> Result<(), AttErrorCode>;

    /// Characteristics that are not readable keep the default refusal.
    fn handle_read(&self) -> Result<Zeroizing<Vec<u8>>, AttErrorCode> {
        Err(AttErrorCode::READ_NOT_PERMITTED)
    }
}
