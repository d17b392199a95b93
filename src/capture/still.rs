use crate::capability::FrameSource;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Presents a single photo of a pass as a camera that keeps showing it
pub struct StillImageSource {
    luma: Option<Arc<Vec<u8>>>,
    resolution: (u32, u32),
    next_id: u64,
}

impl StillImageSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CameraError::NotFound {
                device: path.display().to_string(),
            });
        }

        let image = image::open(path).map_err(|e| CameraError::DeviceOpen {
            device: path.display().to_string(),
            details: e.to_string(),
        })?;
        let luma = image.to_luma8();
        let resolution = luma.dimensions();

        info!(
            "Loaded still image {} ({}x{})",
            path.display(),
            resolution.0,
            resolution.1
        );

        Ok(Self {
            luma: Some(Arc::new(luma.into_raw())),
            resolution,
            next_id: 0,
        })
    }
}

impl FrameSource for StillImageSource {
    fn latest_frame(&mut self) -> Result<Option<FrameData>, CameraError> {
        let luma = self.luma.as_ref().ok_or_else(|| CameraError::CaptureStream {
            details: "Still image released".to_string(),
        })?;

        let frame = FrameData::from_shared(
            self.next_id,
            Arc::clone(luma),
            self.resolution.0,
            self.resolution.1,
            FrameFormat::Luma8,
        );
        self.next_id += 1;
        Ok(Some(frame))
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn stop(&mut self) {
        self.luma = None;
    }

    fn is_live(&self) -> bool {
        self.luma.is_some()
    }
}
