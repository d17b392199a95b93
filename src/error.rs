use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the scanner
#[derive(Error, Debug)]
pub enum GatepassError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Decoder error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },
}

impl GatepassError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Map to the scan error taxonomy, where one applies
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            GatepassError::Camera(_) => Some(ErrorKind::CameraUnavailable),
            GatepassError::Decode(_) => Some(ErrorKind::DecoderFault),
            GatepassError::Payload(_) => Some(ErrorKind::UnrecognizedPayload),
            GatepassError::Api(e) if e.is_unreachable() => Some(ErrorKind::ValidationUnreachable),
            GatepassError::Api(_) => Some(ErrorKind::ValidationDenied),
            _ => None,
        }
    }
}

/// Camera acquisition and streaming errors
#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("Camera permission denied: {details}")]
    PermissionDenied { details: String },

    #[error("No camera found at {device}")]
    NotFound { device: String },

    #[error("Failed to open camera {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },

    #[error("Capture stream error: {details}")]
    CaptureStream { details: String },

    #[error("Camera not available on this platform")]
    NotAvailable,
}

impl CameraError {
    /// Message suitable for showing to the person holding the scanner
    pub fn user_message(&self) -> String {
        match self {
            CameraError::PermissionDenied { .. } => {
                "Camera access was denied. Allow camera access to scan passes.".to_string()
            }
            CameraError::NotFound { device } => format!("No camera found ({})", device),
            CameraError::DeviceOpen { device, .. } => format!("Camera {} could not be opened", device),
            CameraError::Configuration { details } => format!("Camera setup failed: {}", details),
            CameraError::CaptureStream { details } => format!("Camera stream stopped: {}", details),
            CameraError::NotAvailable => "No camera is available on this device".to_string(),
        }
    }
}

/// Per-frame decoder errors
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
    #[error("Barcode detector failed: {details}")]
    Detector { details: String },

    #[error("Frame {frame_id} cannot be decoded: {details}")]
    UnsupportedFrame { frame_id: u64, details: String },

    #[error("No native barcode decoder available")]
    NotAvailable,
}

/// Payload interpretation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Empty payload")]
    Empty,

    #[error("Unrecognized payload: {payload}")]
    Unrecognized { payload: String },

    #[error("Invalid visitor identifier: {identifier}")]
    InvalidIdentifier { identifier: String },
}

/// Validation endpoint errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid validation endpoint: {details}")]
    InvalidEndpoint { details: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Validation request timed out")]
    Timeout,

    #[error("Validation endpoint returned status {status}")]
    Status { status: u16, body: String },

    #[error("Malformed validation response: {details}")]
    MalformedBody { details: String },
}

impl ApiError {
    /// Whether the endpoint could not be reached at all, as opposed to
    /// answering with something we could not understand
    pub fn is_unreachable(&self) -> bool {
        !matches!(self, ApiError::MalformedBody { .. })
    }
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {missed} events")]
    Lagged { missed: u64 },

    #[error("Event bus closed")]
    ChannelClosed,
}

/// Error taxonomy reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Permission denied or no hardware; not retried
    CameraUnavailable,
    /// Native decoder failed on a frame; recovered by switching to fallback,
    /// terminal only when the fallback has no payload source left
    DecoderFault,
    /// Payload matched none of the parse rules
    UnrecognizedPayload,
    /// Validation endpoint unreachable; recovered by local routing
    ValidationUnreachable,
    /// Validation explicitly or structurally rejected the payload
    ValidationDenied,
}

impl ErrorKind {
    /// Terminal kinds end the session with a user-visible error
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ErrorKind::CameraUnavailable
                | ErrorKind::UnrecognizedPayload
                | ErrorKind::ValidationDenied
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CameraUnavailable => "camera_unavailable",
            ErrorKind::DecoderFault => "decoder_fault",
            ErrorKind::UnrecognizedPayload => "unrecognized_payload",
            ErrorKind::ValidationUnreachable => "validation_unreachable",
            ErrorKind::ValidationDenied => "validation_denied",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, GatepassError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_kinds() {
        assert!(ErrorKind::CameraUnavailable.is_terminal());
        assert!(ErrorKind::UnrecognizedPayload.is_terminal());
        assert!(ErrorKind::ValidationDenied.is_terminal());
        assert!(!ErrorKind::DecoderFault.is_terminal());
        assert!(!ErrorKind::ValidationUnreachable.is_terminal());
    }

    #[test]
    fn test_error_kind_mapping() {
        let err: GatepassError = CameraError::NotAvailable.into();
        assert_eq!(err.kind(), Some(ErrorKind::CameraUnavailable));

        let err: GatepassError = PayloadError::Empty.into();
        assert_eq!(err.kind(), Some(ErrorKind::UnrecognizedPayload));

        assert_eq!(GatepassError::system("boom").kind(), None);
    }

    #[test]
    fn test_api_error_reachability() {
        assert!(ApiError::Timeout.is_unreachable());
        assert!(ApiError::Status {
            status: 502,
            body: String::new()
        }
        .is_unreachable());
        assert!(!ApiError::MalformedBody {
            details: "not json".to_string()
        }
        .is_unreachable());
    }

    #[test]
    fn test_camera_user_message() {
        let err = CameraError::PermissionDenied {
            details: "NotAllowedError".to_string(),
        };
        assert!(err.user_message().contains("denied"));
    }
}
