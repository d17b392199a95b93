use super::payload::ParsedPayload;
use super::types::{Provenance, ValidationResult, VisitorReference};
use crate::error::{ErrorKind, PayloadError};
use serde::Serialize;
use tracing::{info, warn};

/// Terminal result of a scan session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    NavigateTo(VisitorReference),
    Error { kind: ErrorKind, message: String },
    Cancelled,
}

impl Outcome {
    pub fn error<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Outcome::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::NavigateTo(_) => "navigate",
            Outcome::Error { .. } => "error",
            Outcome::Cancelled => "cancelled",
        }
    }
}

impl From<PayloadError> for Outcome {
    fn from(error: PayloadError) -> Self {
        Outcome::error(ErrorKind::UnrecognizedPayload, error.to_string())
    }
}

fn local_reference(parsed: &ParsedPayload) -> Outcome {
    match VisitorReference::new(parsed.identifier.as_str(), Provenance::LocalFallback) {
        Ok(reference) => Outcome::NavigateTo(reference),
        Err(e) => e.into(),
    }
}

/// Decide the outcome for a parsed payload. `None` means validation was skipped.
pub fn route(parsed: &ParsedPayload, validation: Option<ValidationResult>) -> Outcome {
    match validation {
        None => {
            info!("Routing on local identifier {}", parsed.identifier);
            local_reference(parsed)
        }
        Some(ValidationResult::Granted(reference)) => {
            info!("Validation granted {}", reference);
            Outcome::NavigateTo(reference)
        }
        Some(ValidationResult::Denied { reason }) => {
            warn!("Validation denied: {}", reason);
            Outcome::error(ErrorKind::ValidationDenied, reason)
        }
        Some(ValidationResult::Unreachable { reason }) => {
            warn!(
                "Validation unreachable ({}), routing on local identifier {}",
                reason, parsed.identifier
            );
            local_reference(parsed)
        }
    }
}
