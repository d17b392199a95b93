use crate::error::PayloadError;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

/// Longest identifier accepted from any payload encoding
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Minimum length of a digit run treated as a visitor number
const MIN_NUMERIC_LEN: usize = 6;

/// Payload encodings, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadRule {
    /// `visitor:<id>[:...]`
    ColonPrefix,
    /// `visitor-<id>`
    DashPrefix,
    /// The whole payload is a visitor number
    BareNumeric,
    /// JSON object with `visitorId` or `id`
    JsonField,
    /// First run of digits anywhere in the payload
    DigitRun,
}

type Matcher = fn(&str) -> Option<String>;

const PAYLOAD_RULES: &[(PayloadRule, Matcher)] = &[
    (PayloadRule::ColonPrefix, match_colon_prefix),
    (PayloadRule::DashPrefix, match_dash_prefix),
    (PayloadRule::BareNumeric, match_bare_numeric),
    (PayloadRule::JsonField, match_json_field),
    (PayloadRule::DigitRun, match_digit_run),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedPayload {
    pub identifier: String,
    pub rule: PayloadRule,
}

/// Non-empty, bounded, ASCII alphanumerics plus `-` and `_`
pub fn is_valid_identifier(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_IDENTIFIER_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Extract the visitor identifier from a raw payload; first matching rule wins
pub fn parse_payload(raw: &str) -> Result<ParsedPayload, PayloadError> {
    let payload = raw.trim();
    if payload.is_empty() {
        return Err(PayloadError::Empty);
    }

    for (rule, matcher) in PAYLOAD_RULES {
        match matcher(payload) {
            Some(identifier) if is_valid_identifier(&identifier) => {
                debug!("Payload matched {:?}", rule);
                return Ok(ParsedPayload {
                    identifier,
                    rule: *rule,
                });
            }
            Some(candidate) => {
                trace!("{:?} candidate {:?} rejected", rule, candidate);
            }
            None => {}
        }
    }

    Err(PayloadError::Unrecognized {
        payload: payload.to_string(),
    })
}

fn match_colon_prefix(payload: &str) -> Option<String> {
    payload
        .strip_prefix("visitor:")
        .map(|rest| rest.split(':').next().unwrap_or_default().to_string())
}

fn match_dash_prefix(payload: &str) -> Option<String> {
    payload.strip_prefix("visitor-").map(str::to_string)
}

fn match_bare_numeric(payload: &str) -> Option<String> {
    (payload.len() >= MIN_NUMERIC_LEN && payload.bytes().all(|b| b.is_ascii_digit()))
        .then(|| payload.to_string())
}

fn match_json_field(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    let object = value.as_object()?;

    ["visitorId", "id"]
        .iter()
        .filter_map(|field| object.get(*field).and_then(scalar_identifier))
        .find(|candidate| is_valid_identifier(candidate))
}

fn match_digit_run(payload: &str) -> Option<String> {
    payload
        .split(|c: char| !c.is_ascii_digit())
        .find(|run| run.len() >= MIN_NUMERIC_LEN)
        .map(str::to_string)
}

/// String or integer JSON value as an identifier candidate
pub(crate) fn scalar_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}
