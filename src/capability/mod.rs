//! Platform capabilities the scanner depends on.
//!
//! Everything environment-specific (camera access, barcode detection, the
//! ability to share a badge link) is reached through [`Capability`] so a scan
//! session never queries the platform directly.

mod platform;
mod scripted;

pub use platform::PlatformCapability;
pub use scripted::{DecodeStep, ScriptedCapability};

use crate::config::CameraConfig;
use crate::error::{CameraError, DecodeError};
use crate::frame::FrameData;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which way the requested camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointed at the pass
    Environment,
    /// Front camera, pointed at the operator
    User,
}

/// Parameters for acquiring a camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraRequest {
    pub facing: FacingMode,
    /// Preferred resolution; the platform may deliver less
    pub ideal_resolution: (u32, u32),
    pub fps: u32,
}

impl CameraRequest {
    /// Environment-facing request at the configured ideal resolution
    pub fn environment(config: &CameraConfig) -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_resolution: config.ideal_resolution,
            fps: config.fps,
        }
    }
}

/// A live source of frames backed by a hardware (or simulated) camera.
///
/// `stop` must release every underlying track and be safe to call repeatedly.
pub trait FrameSource: Send {
    /// Latest frame available since the previous call, if any
    fn latest_frame(&mut self) -> Result<Option<FrameData>, CameraError>;

    /// Resolution actually delivered by the platform
    fn resolution(&self) -> (u32, u32);

    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// Capability set of the host environment
#[async_trait]
pub trait Capability: Send + Sync {
    /// Acquire a camera; permission denial and missing hardware are errors
    async fn open_camera(&self, request: &CameraRequest)
        -> Result<Box<dyn FrameSource>, CameraError>;

    /// Whether `decode_frame` is backed by a native barcode detector
    fn has_native_decoder(&self) -> bool;

    /// Attempt to decode one QR payload from a frame
    fn decode_frame(&self, frame: &FrameData) -> Result<Option<String>, DecodeError>;

    /// Whether the host can share a visitor badge link
    fn shareable(&self) -> bool;

    /// Badge link to share for a visitor, when sharing is supported
    fn share_link(&self, _visitor_id: &str) -> Option<String> {
        None
    }
}
