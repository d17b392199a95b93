pub mod api;
pub mod capability;
pub mod capture;
pub mod config;
pub mod decode;
pub mod error;
pub mod events;
pub mod frame;
pub mod interpret;
pub mod keyboard_input;
pub mod session;

pub use api::{HttpValidationClient, ValidationClient};
pub use capability::{
    CameraRequest, Capability, DecodeStep, FacingMode, FrameSource, PlatformCapability,
    ScriptedCapability,
};
pub use capture::{open_camera, CameraHandle};
pub use config::GatepassConfig;
pub use decode::{DecodeStage, DecodeState, DecoderStrategy};
pub use error::{ErrorKind, GatepassError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, PayloadOrigin, ScanEvent};
pub use frame::{FrameData, FrameFormat};
pub use interpret::{
    parse_payload, route, Outcome, ParsedPayload, PayloadRule, Provenance, RawPayload,
    ValidationResult, VisitorReference,
};
pub use keyboard_input::ManualEntryPrompt;
pub use session::{ScanControls, ScanInputs, ScanReport, ScanSession, Scanner, SessionState};
