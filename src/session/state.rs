use crate::capture::CameraHandle;
use crate::error::ErrorKind;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Opening,
    Scanning,
    /// A payload was found and is being interpreted
    Processing,
    Finished,
    Cancelled,
}

/// One scanning attempt. Owns the camera for its whole lifetime.
#[derive(Debug)]
pub struct ScanSession {
    id: Uuid,
    state: SessionState,
    camera: Option<CameraHandle>,
    uses_fallback_decoder: bool,
    last_error: Option<ErrorKind>,
    in_flight: bool,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Opening,
            camera: None,
            uses_fallback_decoder: false,
            last_error: None,
            in_flight: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn uses_fallback_decoder(&self) -> bool {
        self.uses_fallback_decoder
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub(crate) fn attach_camera(&mut self, camera: CameraHandle) {
        self.camera = Some(camera);
        self.state = SessionState::Scanning;
    }

    pub(crate) fn camera_mut(&mut self) -> Option<&mut CameraHandle> {
        self.camera.as_mut()
    }

    pub fn has_camera(&self) -> bool {
        self.camera.as_ref().is_some_and(CameraHandle::is_open)
    }

    pub(crate) fn set_fallback(&mut self) {
        self.uses_fallback_decoder = true;
    }

    pub(crate) fn record_error(&mut self, kind: ErrorKind) {
        self.last_error = Some(kind);
    }

    /// Take the in-flight latch; false while a payload is already handled
    pub(crate) fn begin_processing(&mut self) -> bool {
        if self.in_flight {
            debug!(session = %self.id, "Payload rejected, one is already in flight");
            return false;
        }
        self.in_flight = true;
        self.state = SessionState::Processing;
        true
    }

    /// Release the camera. Returns true only for the call that released it.
    pub(crate) fn release_camera(&mut self) -> bool {
        self.camera.as_mut().is_some_and(CameraHandle::close)
    }

    pub(crate) fn finish(&mut self, cancelled: bool) {
        self.state = if cancelled {
            SessionState::Cancelled
        } else {
            SessionState::Finished
        };
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}
