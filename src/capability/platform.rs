use super::{Capability, CameraRequest, FrameSource};
use crate::config::{ApiConfig, CameraConfig};
use crate::error::{CameraError, DecodeError};
use crate::frame::FrameData;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Capabilities of the machine the scanner runs on.
///
/// Camera access goes through GStreamer (`camera` feature, Linux only) or a
/// still image (`stills` feature); QR detection uses rqrr (`native-decoder`).
pub struct PlatformCapability {
    camera: CameraConfig,
    badge_url_template: Option<String>,
}

impl PlatformCapability {
    pub fn new(camera: CameraConfig, api: &ApiConfig) -> Self {
        Self {
            camera,
            badge_url_template: api.badge_url_template.clone(),
        }
    }

    #[cfg(feature = "stills")]
    fn open_still(&self, path: &str) -> Result<Box<dyn FrameSource>, CameraError> {
        let source = crate::capture::StillImageSource::open(path)?;
        Ok(Box::new(source))
    }

    #[cfg(not(feature = "stills"))]
    fn open_still(&self, path: &str) -> Result<Box<dyn FrameSource>, CameraError> {
        warn!("Still image support is disabled, cannot open {}", path);
        Err(CameraError::NotAvailable)
    }

    #[cfg(all(feature = "camera", target_os = "linux"))]
    async fn open_device(
        &self,
        request: &CameraRequest,
    ) -> Result<Box<dyn FrameSource>, CameraError> {
        let device = match request.facing {
            super::FacingMode::Environment => self.camera.device_index,
            super::FacingMode::User => self.camera.user_device_index.unwrap_or_else(|| {
                warn!("No user-facing camera configured, using environment camera");
                self.camera.device_index
            }),
        };
        let request = request.clone();

        // Pipeline start-up blocks on the device
        tokio::task::spawn_blocking(move || {
            crate::capture::GstFrameSource::open(device, &request)
                .map(|source| Box::new(source) as Box<dyn FrameSource>)
        })
        .await
        .map_err(|e| CameraError::Configuration {
            details: format!("Camera open task failed: {}", e),
        })?
    }

    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    async fn open_device(
        &self,
        _request: &CameraRequest,
    ) -> Result<Box<dyn FrameSource>, CameraError> {
        #[cfg(not(target_os = "linux"))]
        warn!("GStreamer camera capture is only available on Linux");
        #[cfg(not(feature = "camera"))]
        warn!("Camera feature is disabled");
        Err(CameraError::NotAvailable)
    }
}

#[async_trait]
impl Capability for PlatformCapability {
    async fn open_camera(
        &self,
        request: &CameraRequest,
    ) -> Result<Box<dyn FrameSource>, CameraError> {
        if let Some(path) = self.camera.still_image.as_deref() {
            info!("Using still image {} as frame source", path);
            return self.open_still(path);
        }

        debug!(
            "Requesting {:?} camera at {}x{} @ {}fps",
            request.facing, request.ideal_resolution.0, request.ideal_resolution.1, request.fps
        );

        self.open_device(request).await
    }

    fn has_native_decoder(&self) -> bool {
        cfg!(feature = "native-decoder")
    }

    #[cfg(feature = "native-decoder")]
    fn decode_frame(&self, frame: &FrameData) -> Result<Option<String>, DecodeError> {
        crate::decode::native::decode_frame(frame)
    }

    #[cfg(not(feature = "native-decoder"))]
    fn decode_frame(&self, _frame: &FrameData) -> Result<Option<String>, DecodeError> {
        Err(DecodeError::NotAvailable)
    }

    fn shareable(&self) -> bool {
        self.badge_url_template.is_some()
    }

    fn share_link(&self, visitor_id: &str) -> Option<String> {
        self.badge_url_template
            .as_ref()
            .map(|template| template.replace("{id}", visitor_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_link_requires_template() {
        let camera = CameraConfig::default();
        let mut api = ApiConfig::default();

        let capability = PlatformCapability::new(camera.clone(), &api);
        assert!(!capability.shareable());
        assert_eq!(capability.share_link("42"), None);

        api.badge_url_template = Some("https://passes.example.com/visitor/{id}/badge".to_string());
        let capability = PlatformCapability::new(camera, &api);
        assert!(capability.shareable());
        assert_eq!(
            capability.share_link("42").as_deref(),
            Some("https://passes.example.com/visitor/42/badge")
        );
    }

    #[tokio::test]
    async fn test_missing_still_image_is_camera_error() {
        let camera = CameraConfig {
            still_image: Some("/nonexistent/pass.png".to_string()),
            ..CameraConfig::default()
        };
        let capability = PlatformCapability::new(camera.clone(), &ApiConfig::default());
        let result = capability
            .open_camera(&CameraRequest::environment(&camera))
            .await;
        assert!(result.is_err());
    }
}
