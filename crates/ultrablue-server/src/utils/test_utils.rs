//! Recording doubles for the characteristic's collaborators, shared by unit
//! and integration tests.

use super::lock;
use crate::events::EventSink;
use crate::pcr::PcrExtender;

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use ultrablue::{PcrIndex, ResponseError, ResponseOutcome, Secret};

/// A [`PcrExtender`] that records every extension and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingPcr {
    calls: Mutex<Vec<(PcrIndex, Secret)>>,
    fail_next: AtomicBool,
}

impl RecordingPcr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next extension fail without recording it.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(PcrIndex, Secret)> {
        lock(&self.calls).clone()
    }
}

impl PcrExtender for RecordingPcr {
    fn extend(&self, index: PcrIndex, digest: &Secret) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("injected TPM failure"));
        }
        lock(&self.calls).push((index, digest.clone()));
        Ok(())
    }
}

/// An [`EventSink`] that keeps everything it is given.
#[derive(Debug, Default)]
pub struct RecordingSink {
    results: Mutex<Vec<ResponseOutcome>>,
    errors: Mutex<Vec<ResponseError>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<ResponseOutcome> {
        lock(&self.results).clone()
    }

    pub fn error_count(&self) -> usize {
        lock(&self.errors).len()
    }

    /// Runs `f` over the recorded errors, which are not `Clone`.
    pub fn with_errors<R>(&self, f: impl FnOnce(&[ResponseError]) -> R) -> R {
        f(&lock(&self.errors))
    }
}

impl EventSink for RecordingSink {
    fn report_result(&self, outcome: ResponseOutcome) {
        lock(&self.results).push(outcome);
    }

    fn report_error(&self, error: ResponseError) {
        lock(&self.errors).push(error);
    }
}
