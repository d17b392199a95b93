use crate::capability::{Capability, CameraRequest, FrameSource};
use crate::error::CameraError;
use crate::frame::FrameData;
use tracing::{debug, info, warn};

/// Acquire an environment-facing camera through the capability set.
///
/// A resolution below the ideal one is accepted with a warning. Errors are
/// returned as-is and never retried here.
pub async fn open_camera(
    capability: &dyn Capability,
    request: &CameraRequest,
) -> Result<CameraHandle, CameraError> {
    info!(
        "Opening {:?} camera (ideal {}x{} @ {}fps)",
        request.facing, request.ideal_resolution.0, request.ideal_resolution.1, request.fps
    );

    let source = capability.open_camera(request).await.map_err(|e| {
        warn!("Camera unavailable: {}", e);
        e
    })?;

    let resolution = source.resolution();
    if resolution.0 < request.ideal_resolution.0 || resolution.1 < request.ideal_resolution.1 {
        warn!(
            "Camera resolution below ideal: requested {}x{}, got {}x{}",
            request.ideal_resolution.0, request.ideal_resolution.1, resolution.0, resolution.1
        );
    }

    Ok(CameraHandle {
        source: Some(source),
        resolution,
    })
}

/// Exclusive owner of an open camera.
///
/// The underlying source is stopped exactly once, by the first `close` or
/// on drop, whichever comes first.
pub struct CameraHandle {
    source: Option<Box<dyn FrameSource>>,
    resolution: (u32, u32),
}

impl CameraHandle {
    /// Latest frame from the camera; `None` when nothing new arrived
    pub fn latest_frame(&mut self) -> Result<Option<FrameData>, CameraError> {
        match self.source.as_mut() {
            Some(source) => source.latest_frame(),
            None => Err(CameraError::CaptureStream {
                details: "camera already released".to_string(),
            }),
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Release the camera. Returns true when this call did the releasing.
    pub fn close(&mut self) -> bool {
        match self.source.take() {
            Some(mut source) => {
                source.stop();
                info!("Camera released");
                true
            }
            None => {
                debug!("Camera already released");
                false
            }
        }
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraHandle")
            .field("open", &self.is_open())
            .field("resolution", &self.resolution)
            .finish()
    }
}
