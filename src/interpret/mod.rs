//! Payload interpretation and routing.
//!
//! Turns a raw payload into a canonical visitor identifier, reads the
//! validation endpoint's answer and decides the terminal outcome of a scan.
//! Everything here is pure; the network call itself lives in `api`.

mod payload;
mod response;
mod routing;
mod types;

pub use payload::{is_valid_identifier, parse_payload, ParsedPayload, PayloadRule, MAX_IDENTIFIER_LEN};
pub use response::{classify, interpret_response, is_truthy, ResponseShape};
pub use routing::{route, Outcome};
pub use types::{Provenance, RawPayload, ValidationResult, VisitorReference};
