mod service;
mod transport;

// re-exports
pub use service::{init_tracing, AttestationService, AttestationServiceBuilder, SessionVerdict};
pub use transport::{parse_request, GattRequest, GattResponse, LoopbackTransport, Transport};
