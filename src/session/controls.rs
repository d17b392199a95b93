use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const MANUAL_QUEUE_DEPTH: usize = 4;

/// Host side of a running scan: close the scanner or type a pass in
#[derive(Clone)]
pub struct ScanControls {
    cancel: CancellationToken,
    manual: mpsc::Sender<String>,
}

/// Session side of `ScanControls`
pub struct ScanInputs {
    pub(crate) cancel: CancellationToken,
    pub(crate) manual: mpsc::Receiver<String>,
}

impl ScanControls {
    pub fn pair() -> (ScanControls, ScanInputs) {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(MANUAL_QUEUE_DEPTH);
        (
            ScanControls {
                cancel: cancel.clone(),
                manual: tx,
            },
            ScanInputs { cancel, manual: rx },
        )
    }

    /// Close the scanner; safe to call at any time and more than once
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!("Scan cancelled by host");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Hand a manually entered payload to the session.
    /// Returns false when the session is no longer listening.
    pub async fn submit_manual<S: Into<String>>(&self, text: S) -> bool {
        self.manual.send(text.into()).await.is_ok()
    }

    /// Non-async variant of `submit_manual` for input threads
    pub fn try_submit_manual<S: Into<String>>(&self, text: S) -> bool {
        self.manual.try_send(text.into()).is_ok()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl ScanInputs {
    /// Inputs nobody will ever drive: no manual entry, no cancellation
    pub fn detached() -> Self {
        let (_, inputs) = ScanControls::pair();
        inputs
    }
}
