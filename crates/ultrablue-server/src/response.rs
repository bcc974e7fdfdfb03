//! The response characteristic.
//!
//! The verifier writes its attestation response here once it has checked the
//! device's quote. A response carrying a secret binds that secret into device
//! state by extending [`ATTESTATION_PCR`]. During enrollment the same
//! characteristic is readable and hands out the secret the verifier should
//! send back on later successful attestations.

use crate::characteristic::GattCharacteristic;
use crate::enrollment::Enrollment;
use crate::events::EventSink;
use crate::pcr::PcrExtender;
use crate::utils::lock;

use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use ultrablue::{
    AttErrorCode, AttestationResponse, CharacteristicProperties, ResponseError,
    ResponseOutcome, ATTESTATION_PCR, RESPONSE_CHR_UUID,
};
use uuid::Uuid;
use zeroize::Zeroizing;

/// The response characteristic. Writes go through the PCR extender and their
/// outcome is reported to the event sink. Reads are served from the
/// enrollment state.
pub struct ResponseHandler<P: PcrExtender + ?Sized, S: EventSink + ?Sized> {
    sink: Arc<S>,
    pcr: Arc<P>,
    enrollment: Arc<Enrollment>,
    // one write at a time, whatever the BLE stack does
    write_mutex: Mutex<()>,
}

impl<P: PcrExtender + ?Sized, S: EventSink + ?Sized> std::fmt::Debug for ResponseHandler<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseHandler")
            .field("uuid", &RESPONSE_CHR_UUID)
            .field("enrolling", &self.enrollment.is_enrolling())
            .finish_non_exhaustive()
    }
}

impl<P: PcrExtender + ?Sized, S: EventSink + ?Sized> ResponseHandler<P, S> {
    /// Registers the characteristic. Construction cannot fail.
    pub fn new(sink: Arc<S>, pcr: Arc<P>, enrollment: Arc<Enrollment>) -> Self {
        debug!(target: "gatt::response", "Response characteristic registered as {RESPONSE_CHR_UUID}");
        Self {
            sink,
            pcr,
            enrollment,
            write_mutex: Mutex::new(()),
        }
    }

    /// Handles a verifier write. Exactly one result or one error reaches the
    /// sink per call; the returned code is what the peer sees on failure.
    pub fn on_write(&self, payload: &[u8]) -> Result<ResponseOutcome, AttErrorCode> {
        let _lock = lock(&self.write_mutex);

        match self.process(payload) {
            Ok(outcome) => {
                info!(target: "gatt::response", "Attestation response handled: {outcome}");
                self.sink.report_result(outcome);
                Ok(outcome)
            }
            Err(e) => {
                let code = e.att_error_code();
                warn!(target: "gatt::response", "Attestation response dropped: {e}");
                self.sink.report_error(e);
                Err(code)
            }
        }
    }

    /// Discloses the enrollment secret. Refused outside enrollment mode.
    pub fn on_read(&self) -> Result<Zeroizing<Vec<u8>>, AttErrorCode> {
        match self.enrollment.secret() {
            Some(secret) => {
                info!(target: "gatt::response", "Enrollment secret {} read", secret.fingerprint());
                Ok(Zeroizing::new(secret.as_ref().to_vec()))
            }
            None => {
                let e = ResponseError::PermissionDenied;
                warn!(target: "gatt::response", "{e}");
                Err(e.att_error_code())
            }
        }
    }

    fn process(&self, payload: &[u8]) -> Result<ResponseOutcome, ResponseError> {
        match AttestationResponse::decode(payload)? {
            AttestationResponse::NoSecret => Ok(ResponseOutcome::NoSecret),
            AttestationResponse::Rejected => Ok(ResponseOutcome::Rejected),
            AttestationResponse::Secret(secret) => {
                debug!(
                    target: "gatt::response",
                    "Extending {ATTESTATION_PCR} with secret {}",
                    secret.fingerprint()
                );
                self.pcr
                    .extend(ATTESTATION_PCR, &secret)
                    .map_err(|source| ResponseError::PcrExtendFailure {
                        index: ATTESTATION_PCR,
                        source,
                    })?;
                Ok(ResponseOutcome::Extended)
            }
        }
    }
}

impl<P, S> GattCharacteristic for ResponseHandler<P, S>
where
    P: PcrExtender + ?Sized,
    S: EventSink + ?Sized,
{
    fn uuid(&self) -> Uuid {
        RESPONSE_CHR_UUID
    }

    fn properties(&self) -> CharacteristicProperties {
        CharacteristicProperties::WRITE | CharacteristicProperties::READ
    }

    fn handle_write(&self, payload: &[u8]) -> Result<(), AttErrorCode> {
        self.on_write(payload).map(|_| ())
    }

    fn handle_read(&self) -> Result<Zeroizing<Vec<u8>>, AttErrorCode> {
        self.on_read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcr::SoftwarePcrBank;
    use crate::utils::test_utils::{RecordingPcr, RecordingSink};
    use ultrablue::{PayloadError, Secret, TAG_NO_SECRET, TAG_REJECTED};

    fn setup(
        enrollment: Enrollment,
    ) -> (
        ResponseHandler<RecordingPcr, RecordingSink>,
        Arc<RecordingPcr>,
        Arc<RecordingSink>,
    ) {
        let pcr = Arc::new(RecordingPcr::new());
        let sink = Arc::new(RecordingSink::new());
        let handler = ResponseHandler::new(sink.clone(), pcr.clone(), Arc::new(enrollment));
        (handler, pcr, sink)
    }

    #[test]
    fn test_secret_extends_pcr9_once() {
        let (handler, pcr, sink) = setup(Enrollment::disabled());
        let secret = [0x11u8; 32];

        assert_eq!(handler.on_write(&secret), Ok(ResponseOutcome::Extended));

        assert_eq!(pcr.calls(), vec![(ATTESTATION_PCR, Secret::new(secret))]);
        assert_eq!(sink.results(), vec![ResponseOutcome::Extended]);
        assert_eq!(sink.results()[0].code(), 0);
        assert_eq!(sink.error_count(), 0);
    }

    #[test]
    fn test_no_secret_and_rejected_skip_pcr() {
        let (handler, pcr, sink) = setup(Enrollment::disabled());

        assert_eq!(handler.on_write(&[TAG_NO_SECRET]), Ok(ResponseOutcome::NoSecret));
        assert_eq!(handler.on_write(&[TAG_REJECTED]), Ok(ResponseOutcome::Rejected));

        assert!(pcr.calls().is_empty());
        assert_eq!(
            sink.results(),
            vec![ResponseOutcome::NoSecret, ResponseOutcome::Rejected]
        );
        assert_eq!(sink.error_count(), 0);
    }

    #[test]
    fn test_empty_payload() {
        let (handler, pcr, sink) = setup(Enrollment::disabled());

        assert_eq!(
            handler.on_write(&[]),
            Err(AttErrorCode::INVALID_ATTRIBUTE_VALUE_LENGTH)
        );
        assert!(pcr.calls().is_empty());
        assert!(sink.results().is_empty());
        assert_eq!(sink.error_count(), 1);
        assert!(sink.with_errors(|errors| matches!(
            errors,
            [ResponseError::MalformedPayload(PayloadError::Empty)]
        )));
    }

    #[test]
    fn test_pcr_failure_then_recovery() {
        let (handler, pcr, sink) = setup(Enrollment::disabled());
        pcr.fail_next();

        assert_eq!(
            handler.on_write(&[0x22u8; 32]),
            Err(AttErrorCode::UNLIKELY_ERROR)
        );
        assert_eq!(sink.error_count(), 1);
        assert!(sink.with_errors(|errors| matches!(
            errors,
            [ResponseError::PcrExtendFailure { index, .. }] if *index == ATTESTATION_PCR
        )));

        // the handler is still usable
        assert_eq!(handler.on_write(&[0x33u8; 32]), Ok(ResponseOutcome::Extended));
        assert_eq!(pcr.calls().len(), 1);
        assert_eq!(sink.results(), vec![ResponseOutcome::Extended]);
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn test_read_requires_enrollment() {
        let (handler, _, sink) = setup(Enrollment::disabled());
        assert_eq!(handler.on_read(), Err(AttErrorCode::READ_NOT_PERMITTED));
        // read refusals are answered to the peer, not escalated
        assert_eq!(sink.error_count(), 0);

        let (handler, _, _) = setup(Enrollment::enrolling(Secret::new([0x44; 32])));
        assert_eq!(handler.on_read(), Ok(Zeroizing::new(vec![0x44; 32])));
    }

    #[test]
    fn test_enrolled_secret_round_trip_through_software_bank() {
        let enrollment = Arc::new(Enrollment::enrolling(Secret::new([0x55; 32])));
        let bank = Arc::new(SoftwarePcrBank::new());
        let sink = Arc::new(RecordingSink::new());
        let handler = ResponseHandler::new(sink.clone(), bank.clone(), enrollment.clone());

        let secret = handler.on_read().unwrap();
        enrollment.finish();
        assert_eq!(handler.handle_read(), Err(AttErrorCode::READ_NOT_PERMITTED));

        handler.handle_write(&secret).unwrap();
        assert_eq!(
            bank.read(ATTESTATION_PCR),
            SoftwarePcrBank::chain(&[0u8; 32], &secret)
        );
    }

    #[test]
    fn test_descriptor() {
        let (handler, _, _) = setup(Enrollment::disabled());
        assert_eq!(handler.uuid(), RESPONSE_CHR_UUID);
        assert!(handler.properties().contains(CharacteristicProperties::WRITE));
    }
}
