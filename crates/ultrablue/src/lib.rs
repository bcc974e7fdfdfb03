//! Protocol types shared by the Ultrablue attestation server and verifier
//! tooling: characteristic identifiers, the attestation-response wire
//! format and the error taxonomy reported by the response characteristic.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod errors;
pub mod gatt;
pub mod response;
pub mod secret;

pub use errors::*;
pub use gatt::*;
pub use response::*;
pub use secret::*;

/// Default TCTI used to reach the platform TPM through the kernel resource manager.
pub const DEFAULT_TCTI: &str = "device:/dev/tpmrm0";
/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";
