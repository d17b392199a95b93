use super::payload::is_valid_identifier;
use crate::error::PayloadError;
use crate::events::PayloadOrigin;
use serde::{Deserialize, Serialize};

/// Unparsed string produced by the decode stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPayload {
    text: String,
    origin: PayloadOrigin,
}

impl RawPayload {
    /// Returns `None` for an empty payload; a produced payload is never empty
    pub fn new<S: Into<String>>(text: S, origin: PayloadOrigin) -> Option<Self> {
        let text = text.into();
        if text.is_empty() {
            return None;
        }
        Some(Self { text, origin })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> PayloadOrigin {
        self.origin
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// How a visitor identifier was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    ServerValidated,
    LocalFallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::ServerValidated => "server-validated",
            Provenance::LocalFallback => "local-fallback",
        }
    }
}

/// Canonical visitor identifier handed to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitorReference {
    identifier: String,
    source: Provenance,
}

impl VisitorReference {
    pub fn new<S: Into<String>>(identifier: S, source: Provenance) -> Result<Self, PayloadError> {
        let identifier = identifier.into();
        if !is_valid_identifier(&identifier) {
            return Err(PayloadError::InvalidIdentifier { identifier });
        }
        Ok(Self { identifier, source })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn source(&self) -> Provenance {
        self.source
    }
}

impl std::fmt::Display for VisitorReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.identifier, self.source.as_str())
    }
}

/// Outcome of asking the validation endpoint about a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Granted(VisitorReference),
    Denied { reason: String },
    Unreachable { reason: String },
}

impl ValidationResult {
    pub fn label(&self) -> &'static str {
        match self {
            ValidationResult::Granted(_) => "granted",
            ValidationResult::Denied { .. } => "denied",
            ValidationResult::Unreachable { .. } => "unreachable",
        }
    }
}
