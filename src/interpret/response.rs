use super::payload::scalar_identifier;
use super::types::{Provenance, ValidationResult, VisitorReference};
use crate::error::ApiError;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Known layouts of a validation response, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// `{ "valid": .., "visitorId": .. }`
    Valid,
    /// `{ "accessGranted": .., "visitorId": .. }`
    AccessGranted,
    /// `{ "data": { "visitorId": .. } }`
    Data,
}

type ShapeMatcher = fn(&Map<String, Value>) -> Option<ValidationResult>;

const RESPONSE_SHAPES: &[(ResponseShape, ShapeMatcher)] = &[
    (ResponseShape::Valid, match_valid),
    (ResponseShape::AccessGranted, match_access_granted),
    (ResponseShape::Data, match_data),
];

/// Loose truthiness for flags that may arrive as bools, numbers or strings
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Read a validation response. Anything not confidently recognized is a denial.
pub fn interpret_response(body: &Value) -> ValidationResult {
    let Some(object) = body.as_object() else {
        warn!("Validation response is not a JSON object");
        return ValidationResult::Denied {
            reason: "Unrecognized validation response".to_string(),
        };
    };

    for (shape, matcher) in RESPONSE_SHAPES {
        if let Some(result) = matcher(object) {
            debug!("Validation response matched {:?} shape: {}", shape, result.label());
            return result;
        }
    }

    if ["valid", "accessGranted"]
        .iter()
        .any(|flag| object.get(*flag).is_some_and(is_truthy))
    {
        warn!("Validation granted access without a visitor identifier");
        return ValidationResult::Denied {
            reason: "Validation granted access without a visitor identifier".to_string(),
        };
    }

    warn!("Validation response matched no known shape");
    ValidationResult::Denied {
        reason: server_message(object)
            .unwrap_or_else(|| "Unrecognized validation response".to_string()),
    }
}

/// Fold the outcome of the validation call into a `ValidationResult`
pub fn classify(response: Result<Value, ApiError>) -> ValidationResult {
    match response {
        Ok(body) => interpret_response(&body),
        Err(e) if e.is_unreachable() => ValidationResult::Unreachable {
            reason: e.to_string(),
        },
        Err(e) => {
            warn!("Failing closed on validation error: {}", e);
            ValidationResult::Denied {
                reason: e.to_string(),
            }
        }
    }
}

fn match_valid(object: &Map<String, Value>) -> Option<ValidationResult> {
    flagged(object, "valid")
}

fn match_access_granted(object: &Map<String, Value>) -> Option<ValidationResult> {
    flagged(object, "accessGranted")
}

fn match_data(object: &Map<String, Value>) -> Option<ValidationResult> {
    let data = object.get("data")?.as_object()?;
    let identifier = present(data, "visitorId")?;

    let flags = [
        object.get("success"),
        data.get("valid"),
        data.get("accessGranted"),
    ];
    if flags.into_iter().flatten().any(|flag| !is_truthy(flag)) {
        return Some(denied(object, Some(data)));
    }

    Some(granted(identifier))
}

/// Top-level grant flag next to a top-level `visitorId`. A truthy flag
/// without that identifier leaves the response to the later shapes.
fn flagged(object: &Map<String, Value>, flag: &str) -> Option<ValidationResult> {
    let flag = object.get(flag)?;
    if !is_truthy(flag) {
        return Some(denied(object, None));
    }

    present(object, "visitorId").map(granted)
}

fn present<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    object.get(field).filter(|value| !value.is_null())
}

fn granted(identifier: &Value) -> ValidationResult {
    let reference = scalar_identifier(identifier)
        .and_then(|id| VisitorReference::new(id, Provenance::ServerValidated).ok());

    match reference {
        Some(reference) => ValidationResult::Granted(reference),
        None => ValidationResult::Denied {
            reason: format!("Validation returned an unusable visitor identifier: {}", identifier),
        },
    }
}

fn denied(object: &Map<String, Value>, data: Option<&Map<String, Value>>) -> ValidationResult {
    let reason = server_message(object)
        .or_else(|| data.and_then(server_message))
        .unwrap_or_else(|| "Pass was not accepted".to_string());
    ValidationResult::Denied { reason }
}

fn server_message(object: &Map<String, Value>) -> Option<String> {
    object
        .get("message")
        .or_else(|| object.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
