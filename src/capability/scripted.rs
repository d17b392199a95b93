use super::{Capability, CameraRequest, FrameSource};
use crate::error::{CameraError, DecodeError};
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// One scripted answer of the decoder
#[derive(Debug, Clone)]
pub enum DecodeStep {
    /// No QR code in this frame
    Nothing,
    /// The frame carries this payload
    Payload(String),
    /// The detector throws
    Fault(String),
}

struct ScriptConfig {
    camera_error: Option<CameraError>,
    native_decoder: bool,
    shareable: bool,
    resolution: (u32, u32),
}

struct ScriptState {
    config: Mutex<ScriptConfig>,
    decodes: Mutex<VecDeque<DecodeStep>>,
    opens: AtomicUsize,
    releases: AtomicUsize,
    stop_calls: AtomicUsize,
    decode_calls: AtomicUsize,
}

/// Capability driven by a script instead of hardware.
///
/// Frames are blank; what the "detector" sees is taken from the decode script
/// one step per call, and `Nothing` once the script runs dry. Counters record
/// camera opens, releases and decode attempts so callers can check resource
/// handling. `headless()` is the variant used when no camera backend is
/// wanted at all.
#[derive(Clone)]
pub struct ScriptedCapability {
    state: Arc<ScriptState>,
}

impl ScriptedCapability {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ScriptState {
                config: Mutex::new(ScriptConfig {
                    camera_error: None,
                    native_decoder: true,
                    shareable: false,
                    resolution: (640, 480),
                }),
                decodes: Mutex::new(VecDeque::new()),
                opens: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
                decode_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Blank camera, no native decoder: every session goes straight to fallback
    pub fn headless() -> Self {
        Self::new().without_native_decoder()
    }

    /// Camera acquisition fails with this error
    pub fn with_camera_error(self, error: CameraError) -> Self {
        self.state.config.lock().camera_error = Some(error);
        self
    }

    pub fn without_native_decoder(self) -> Self {
        self.state.config.lock().native_decoder = false;
        self
    }

    pub fn with_resolution(self, width: u32, height: u32) -> Self {
        self.state.config.lock().resolution = (width, height);
        self
    }

    pub fn with_sharing(self) -> Self {
        self.state.config.lock().shareable = true;
        self
    }

    /// Append a decoder answer to the script
    pub fn then_decode(self, step: DecodeStep) -> Self {
        self.state.decodes.lock().push_back(step);
        self
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Number of times a camera was actually released
    pub fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls, including repeated ones
    pub fn stop_calls(&self) -> usize {
        self.state.stop_calls.load(Ordering::SeqCst)
    }

    pub fn decode_calls(&self) -> usize {
        self.state.decode_calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for ScriptedCapability {
    async fn open_camera(
        &self,
        request: &CameraRequest,
    ) -> Result<Box<dyn FrameSource>, CameraError> {
        let (camera_error, resolution) = {
            let config = self.state.config.lock();
            (config.camera_error.clone(), config.resolution)
        };
        if let Some(error) = camera_error {
            debug!("Scripted camera refuses {:?} request: {}", request.facing, error);
            return Err(error);
        }

        self.state.opens.fetch_add(1, Ordering::SeqCst);
        let (width, height) = resolution;
        let blank = Arc::new(vec![0u8; width as usize * height as usize]);

        Ok(Box::new(ScriptedFrameSource {
            state: Arc::clone(&self.state),
            blank,
            resolution,
            next_id: 0,
            live: true,
        }))
    }

    fn has_native_decoder(&self) -> bool {
        self.state.config.lock().native_decoder
    }

    fn decode_frame(&self, frame: &FrameData) -> Result<Option<String>, DecodeError> {
        if !self.has_native_decoder() {
            return Err(DecodeError::NotAvailable);
        }

        self.state.decode_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .state
            .decodes
            .lock()
            .pop_front()
            .unwrap_or(DecodeStep::Nothing);
        trace!("Scripted decode of frame {}: {:?}", frame.id, step);

        match step {
            DecodeStep::Nothing => Ok(None),
            DecodeStep::Payload(payload) => Ok(Some(payload)),
            DecodeStep::Fault(details) => Err(DecodeError::Detector { details }),
        }
    }

    fn shareable(&self) -> bool {
        self.state.config.lock().shareable
    }

    fn share_link(&self, visitor_id: &str) -> Option<String> {
        self.shareable()
            .then(|| format!("gatepass://visitor/{}/badge", visitor_id))
    }
}

struct ScriptedFrameSource {
    state: Arc<ScriptState>,
    blank: Arc<Vec<u8>>,
    resolution: (u32, u32),
    next_id: u64,
    live: bool,
}

impl FrameSource for ScriptedFrameSource {
    fn latest_frame(&mut self) -> Result<Option<FrameData>, CameraError> {
        if !self.live {
            return Err(CameraError::CaptureStream {
                details: "source stopped".to_string(),
            });
        }

        let (width, height) = self.resolution;
        let frame = FrameData::from_shared(
            self.next_id,
            Arc::clone(&self.blank),
            width,
            height,
            FrameFormat::Luma8,
        );
        self.next_id += 1;
        Ok(Some(frame))
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn stop(&mut self) {
        self.state.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.live {
            self.live = false;
            self.state.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
