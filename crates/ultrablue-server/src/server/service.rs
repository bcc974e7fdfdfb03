use super::transport::{GattRequest, GattResponse, Transport};
use crate::characteristic::GattCharacteristic;
use crate::config::ServiceConfig;
use crate::enrollment::Enrollment;
use crate::events::{ChannelSink, ServiceEvents};
use crate::pcr::{PcrBackend, PcrExtender};
use crate::response::ResponseHandler;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use ultrablue::{AttErrorCode, ResponseError, ResponseOutcome, Secret, ULTRABLUE_SERVICE_UUID};
use uuid::Uuid;

/// How a BLE session with the verifier ended.
#[derive(Debug)]
pub enum SessionVerdict {
    /// The response characteristic handled a response.
    Completed(ResponseOutcome),
    /// A characteristic reported an error.
    Failed(ResponseError),
    /// The peer went away before sending a response.
    Disconnected,
}

impl SessionVerdict {
    /// Exit code for a reported error or a transport failure.
    pub const ERROR_CODE: i32 = 2;
    /// Exit code when the peer leaves without a response.
    pub const DISCONNECTED_CODE: i32 = 3;

    /// Process exit code for this verdict.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Completed(outcome) => outcome.code(),
            Self::Failed(_) => Self::ERROR_CODE,
            Self::Disconnected => Self::DISCONNECTED_CODE,
        }
    }
}

/// The Ultrablue GATT service: owns the characteristic table, the enrollment
/// state and the receiving end of the characteristics' event channels.
pub struct AttestationService {
    characteristics: Vec<Box<dyn GattCharacteristic>>,
    enrollment: Arc<Enrollment>,
    events: ServiceEvents,
}

impl std::fmt::Debug for AttestationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let uuids: Vec<Uuid> = self.characteristics.iter().map(|c| c.uuid()).collect();
        f.debug_struct("AttestationService")
            .field("characteristics", &uuids)
            .field("enrollment", &self.enrollment)
            .finish_non_exhaustive()
    }
}

/// A builder that lets us configure the service
#[derive(Default)]
pub struct AttestationServiceBuilder {
    config: ServiceConfig,
    pcr: Option<Arc<dyn PcrExtender>>,
    enrollment_secret: Option<Secret>,
}

impl std::fmt::Debug for AttestationServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationServiceBuilder")
            .field("config", &self.config)
            .field("custom_pcr", &self.pcr.is_some())
            .finish_non_exhaustive()
    }
}

impl AttestationServiceBuilder {
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Selects the PCR backend opened by [`Self::build`].
    pub fn with_pcr_backend(mut self, backend: PcrBackend) -> Self {
        self.config.pcr_backend = backend;
        self
    }

    /// Starts the service in enrollment mode, or not.
    pub fn with_enrollment(mut self, enroll: bool) -> Self {
        self.config.enroll = enroll;
        self
    }

    /// Use `pcr` instead of opening the configured backend.
    pub fn with_pcr_extender(mut self, pcr: Arc<dyn PcrExtender>) -> Self {
        self.pcr = Some(pcr);
        self
    }

    /// Overrides the configured enrollment secret. Only used when enrolling.
    pub fn with_enrollment_secret(mut self, secret: Secret) -> Self {
        self.enrollment_secret = Some(secret);
        self
    }

    pub fn build(self) -> Result<AttestationService> {
        let pcr = match self.pcr {
            Some(pcr) => pcr,
            None => self.config.pcr_backend.open(&self.config.tcti)?,
        };

        let enrollment = if self.config.enroll {
            let secret = match self.enrollment_secret {
                Some(secret) => Some(secret),
                None => self.config.enrollment_secret()?,
            };
            let enrollment = match secret {
                Some(secret) => Enrollment::enrolling(secret),
                None => Enrollment::with_random_secret()?,
            };
            if let Some(secret) = enrollment.secret() {
                info!(target: "service", "Enrollment mode, secret {}", secret.fingerprint());
            }
            enrollment
        } else {
            if self.enrollment_secret.is_some() || self.config.secret.is_some() {
                warn!(target: "service", "Enrollment secret ignored outside enrollment mode");
            }
            Enrollment::disabled()
        };
        let enrollment = Arc::new(enrollment);

        let (sink, events) = ChannelSink::channel();
        let response = ResponseHandler::new(Arc::new(sink), pcr, enrollment.clone());

        Ok(AttestationService {
            characteristics: vec![Box::new(response)],
            enrollment,
            events,
        })
    }
}

impl AttestationService {
    pub fn builder() -> AttestationServiceBuilder {
        AttestationServiceBuilder::default()
    }

    pub const fn uuid(&self) -> Uuid {
        ULTRABLUE_SERVICE_UUID
    }

    pub fn enrollment(&self) -> &Enrollment {
        &self.enrollment
    }

    pub fn characteristic(&self, uuid: Uuid) -> Option<&dyn GattCharacteristic> {
        self.characteristics
            .iter()
            .find(|c| c.uuid() == uuid)
            .map(|c| c.as_ref())
    }

    /// Routes one peer request to its characteristic.
    pub fn dispatch(&self, request: GattRequest) -> GattResponse {
        let (uuid, result) = match request {
            GattRequest::Write { uuid, payload } => {
                debug!(target: "service", "Write of {} bytes to {uuid}", payload.len());
                let result = self
                    .characteristic(uuid)
                    .ok_or(AttErrorCode::ATTRIBUTE_NOT_FOUND)
                    .and_then(|c| c.handle_write(&payload))
                    .map(|()| GattResponse::WriteAck);
                (uuid, result)
            }
            GattRequest::Read { uuid } => {
                debug!(target: "service", "Read of {uuid}");
                let result = self
                    .characteristic(uuid)
                    .ok_or(AttErrorCode::ATTRIBUTE_NOT_FOUND)
                    .and_then(|c| c.handle_read())
                    .map(GattResponse::Value);
                (uuid, result)
            }
        };
        result.unwrap_or_else(|code| {
            if code == AttErrorCode::ATTRIBUTE_NOT_FOUND {
                warn!(target: "service", "No characteristic {uuid}");
            }
            GattResponse::Error(code)
        })
    }

    /// Checks the event channels for something that ends the session.
    /// Errors take precedence over results.
    pub fn poll_verdict(&mut self) -> Option<SessionVerdict> {
        if let Ok(e) = self.events.errors.try_recv() {
            return Some(SessionVerdict::Failed(e));
        }
        self.events
            .results
            .try_recv()
            .ok()
            .map(SessionVerdict::Completed)
    }

    /// Serves `transport` until a characteristic reports an outcome or the
    /// peer disconnects. Enrollment ends with the session.
    pub async fn run<T: Transport>(&mut self, transport: &mut T) -> Result<SessionVerdict> {
        info!(target: "service", "Ultrablue service {} ready", self.uuid());
        let verdict = self.serve(transport).await;
        self.enrollment.finish();

        match &verdict {
            Ok(SessionVerdict::Completed(outcome)) => {
                info!(target: "service", "Session completed: {outcome}")
            }
            Ok(SessionVerdict::Failed(e)) => error!(target: "service", "Session failed: {e}"),
            Ok(SessionVerdict::Disconnected) => {
                warn!(target: "service", "Peer disconnected before responding")
            }
            Err(e) => error!(target: "service", "Transport error: {e:#}"),
        }
        verdict
    }

    async fn serve<T: Transport>(&mut self, transport: &mut T) -> Result<SessionVerdict> {
        while let Some(request) = transport.next_request().await? {
            let response = self.dispatch(request);
            transport.respond(response).await?;
            if let Some(verdict) = self.poll_verdict() {
                return Ok(verdict);
            }
        }
        Ok(SessionVerdict::Disconnected)
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over `default_level`.
/// Logs go to stderr; stdout carries the loopback transport.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Tracing subscriber already installed");
        return;
    }
    info!("Ultrablue server tracing initialized");
}
