//! How characteristics report back to the owning service.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::warn;
use ultrablue::{ResponseError, ResponseOutcome};

/// Result and error reporting capability handed to a characteristic at
/// construction.
///
/// Both calls are made from the BLE write callback and must not block.
pub trait EventSink: Send + Sync {
    fn report_result(&self, outcome: ResponseOutcome);
    fn report_error(&self, error: ResponseError);
}

/// [`EventSink`] backed by unbounded tokio channels, drained by the
/// service loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    results: UnboundedSender<ResponseOutcome>,
    errors: UnboundedSender<ResponseError>,
}

/// Receiving half of a [`ChannelSink`].
#[derive(Debug)]
pub struct ServiceEvents {
    pub results: UnboundedReceiver<ResponseOutcome>,
    pub errors: UnboundedReceiver<ResponseError>,
}

impl ChannelSink {
    pub fn channel() -> (Self, ServiceEvents) {
        let (results_tx, results_rx) = unbounded_channel();
        let (errors_tx, errors_rx) = unbounded_channel();
        (
            Self {
                results: results_tx,
                errors: errors_tx,
            },
            ServiceEvents {
                results: results_rx,
                errors: errors_rx,
            },
        )
    }
}

impl EventSink for ChannelSink {
    fn report_result(&self, outcome: ResponseOutcome) {
        if let Err(e) = self.results.send(outcome) {
            warn!("Result receiver is gone, dropping {}", e.0);
        }
    }

    fn report_error(&self, error: ResponseError) {
        if let Err(e) = self.errors.send(error) {
            warn!("Error receiver is gone, dropping: {}", e.0);
        }
    }
}
