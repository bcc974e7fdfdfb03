//! Device side of Ultrablue: the GATT service a verifier talks to over BLE
//! during remote attestation.

pub mod characteristic;
pub mod config;
pub mod enrollment;
pub mod events;
pub mod pcr;
pub mod response;
pub mod server;
pub mod utils;

pub use characteristic::GattCharacteristic;
pub use config::ServiceConfig;
pub use enrollment::Enrollment;
pub use events::{ChannelSink, EventSink, ServiceEvents};
pub use pcr::{PcrBackend, PcrExtender, SoftwarePcrBank};
pub use response::ResponseHandler;
