use super::*;
use crate::api::ValidationClient;
use crate::capability::{DecodeStep, ScriptedCapability};
use crate::config::GatepassConfig;
use crate::error::{ApiError, CameraError, ErrorKind};
use crate::events::{EventBus, PayloadOrigin, ScanEvent};
use crate::interpret::{Outcome, Provenance, RawPayload};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

enum Reply {
    Body(Value),
    Timeout,
    Malformed,
    Hang,
}

struct StubValidator {
    reply: Reply,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubValidator {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ValidationClient for StubValidator {
    async fn validate(&self, raw_payload: &str, credential: &str) -> Result<Value, ApiError> {
        self.calls
            .lock()
            .push((raw_payload.to_string(), credential.to_string()));
        match &self.reply {
            Reply::Body(body) => Ok(body.clone()),
            Reply::Timeout => Err(ApiError::Timeout),
            Reply::Malformed => Err(ApiError::MalformedBody {
                details: "expected value at line 1 column 1".to_string(),
            }),
            Reply::Hang => {
                std::future::pending::<()>().await;
                Err(ApiError::Timeout)
            }
        }
    }
}

fn create_test_config() -> GatepassConfig {
    let mut config = GatepassConfig::default();
    config.decoder.tick_interval_ms = 10;
    config
}

fn scanner_with(capability: &ScriptedCapability) -> Scanner {
    Scanner::new(Arc::new(capability.clone()), &create_test_config())
}

fn navigated_to(outcome: &Outcome) -> (String, Provenance) {
    match outcome {
        Outcome::NavigateTo(reference) => (reference.identifier().to_string(), reference.source()),
        other => panic!("expected navigation, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_native_scan_without_credential_routes_locally() {
    let capability = ScriptedCapability::new()
        .then_decode(DecodeStep::Nothing)
        .then_decode(DecodeStep::Payload("visitor:42:999".into()));
    let mut scanner = scanner_with(&capability);

    let outcome = scanner.scan(None).await;
    assert_eq!(
        navigated_to(&outcome),
        ("42".to_string(), Provenance::LocalFallback)
    );
    assert_eq!(capability.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_granted_validation_uses_server_identifier() {
    let capability =
        ScriptedCapability::new().then_decode(DecodeStep::Payload("visitor-100234".into()));
    let validator = StubValidator::new(Reply::Body(
        json!({"valid": true, "visitorId": "100234"}),
    ));
    let mut scanner = scanner_with(&capability).with_validator(validator.clone());

    let outcome = scanner.scan(Some("token-1")).await;
    assert_eq!(
        navigated_to(&outcome),
        ("100234".to_string(), Provenance::ServerValidated)
    );

    // The raw payload goes to the server, not the parsed identifier
    assert_eq!(
        validator.calls(),
        vec![("visitor-100234".to_string(), "token-1".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_degrades_on_unreachable_validation() {
    let capability =
        ScriptedCapability::new().then_decode(DecodeStep::Payload("badge#A9-556677-end".into()));
    let validator = StubValidator::new(Reply::Timeout);
    let mut scanner = scanner_with(&capability).with_validator(validator);

    let report = scanner.run(Some("token"), ScanInputs::detached()).await;
    assert_eq!(
        navigated_to(&report.outcome),
        ("556677".to_string(), Provenance::LocalFallback)
    );
    assert_eq!(report.last_error, Some(ErrorKind::ValidationUnreachable));
}

#[tokio::test(start_paused = true)]
async fn test_fails_closed_on_unrecognized_response() {
    let capability = ScriptedCapability::new().then_decode(DecodeStep::Payload("778899".into()));
    let validator = StubValidator::new(Reply::Body(json!({"status": "ok"})));
    let mut scanner = scanner_with(&capability).with_validator(validator);

    let outcome = scanner.scan(Some("token")).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ValidationDenied));
}

#[tokio::test(start_paused = true)]
async fn test_fails_closed_on_malformed_body() {
    let capability = ScriptedCapability::new().then_decode(DecodeStep::Payload("778899".into()));
    let validator = StubValidator::new(Reply::Malformed);
    let mut scanner = scanner_with(&capability).with_validator(validator);

    let outcome = scanner.scan(Some("token")).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ValidationDenied));
}

#[tokio::test(start_paused = true)]
async fn test_explicit_denial_is_surfaced() {
    let capability = ScriptedCapability::new().then_decode(DecodeStep::Payload("778899".into()));
    let validator = StubValidator::new(Reply::Body(
        json!({"accessGranted": false, "message": "Pass expired"}),
    ));
    let mut scanner = scanner_with(&capability).with_validator(validator);

    let outcome = scanner.scan(Some("token")).await;
    assert_eq!(
        outcome,
        Outcome::error(ErrorKind::ValidationDenied, "Pass expired")
    );
    assert_eq!(capability.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_blank_credential_skips_validation() {
    let capability = ScriptedCapability::new().then_decode(DecodeStep::Payload("778899".into()));
    let validator = StubValidator::new(Reply::Body(json!({"valid": false})));
    let mut scanner = scanner_with(&capability).with_validator(validator.clone());

    let outcome = scanner.scan(Some("  ")).await;
    assert_eq!(
        navigated_to(&outcome),
        ("778899".to_string(), Provenance::LocalFallback)
    );
    assert!(validator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_payload_is_terminal() {
    let capability = ScriptedCapability::new().then_decode(DecodeStep::Payload("7788".into()));
    let validator = StubValidator::new(Reply::Body(json!({"valid": true, "visitorId": "1"})));
    let mut scanner = scanner_with(&capability).with_validator(validator.clone());

    let report = scanner.run(Some("token"), ScanInputs::detached()).await;
    assert_eq!(report.outcome.error_kind(), Some(ErrorKind::UnrecognizedPayload));
    assert_eq!(report.last_error, Some(ErrorKind::UnrecognizedPayload));
    assert!(validator.calls().is_empty());
    assert_eq!(capability.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_camera_unavailable_is_terminal() {
    let capability = ScriptedCapability::new().with_camera_error(CameraError::PermissionDenied {
        details: "denied".to_string(),
    });
    let mut scanner = scanner_with(&capability);

    let report = scanner.run(None, ScanInputs::detached()).await;
    assert_eq!(report.outcome.error_kind(), Some(ErrorKind::CameraUnavailable));
    assert_eq!(capability.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_decoder_fault_self_heals_to_synthesis() {
    let capability = ScriptedCapability::new()
        .then_decode(DecodeStep::Nothing)
        .then_decode(DecodeStep::Fault("detector threw".into()));
    let events = EventBus::new(32);
    let mut rx = events.subscribe();
    let mut scanner = scanner_with(&capability).with_event_bus(events);

    let report = scanner.run(None, ScanInputs::detached()).await;
    let (identifier, source) = navigated_to(&report.outcome);
    assert_eq!(identifier.len(), 6);
    assert_eq!(source, Provenance::LocalFallback);
    assert!(report.uses_fallback_decoder);
    assert_eq!(report.last_error, Some(ErrorKind::DecoderFault));
    assert_eq!(capability.decode_calls(), 2);

    let mut downgraded = false;
    let mut origins = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            ScanEvent::StrategyDowngraded { .. } => downgraded = true,
            ScanEvent::PayloadFound { origin, .. } => origins.push(origin),
            _ => {}
        }
    }
    assert!(downgraded);
    assert_eq!(origins, vec![PayloadOrigin::Simulated]);
}

#[tokio::test(start_paused = true)]
async fn test_headless_manual_entry_preempts_synthesis() {
    let capability = ScriptedCapability::headless();
    let mut scanner = scanner_with(&capability);
    let (controls, inputs) = ScanControls::pair();

    let handle = tokio::spawn(async move { scanner.run(None, inputs).await });
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(controls.submit_manual("visitor-778899").await);

    let report = handle.await.unwrap();
    assert_eq!(
        navigated_to(&report.outcome),
        ("778899".to_string(), Provenance::LocalFallback)
    );
    assert!(report.uses_fallback_decoder);
    assert_eq!(capability.decode_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_manual_entry_accepted_while_native_scanning() {
    let capability = ScriptedCapability::new();
    let mut scanner = scanner_with(&capability);
    let (controls, inputs) = ScanControls::pair();

    assert!(controls.try_submit_manual("visitor:31337:1"));
    let report = scanner.run(None, inputs).await;
    assert_eq!(navigated_to(&report.outcome).0, "31337");
    assert!(!report.uses_fallback_decoder);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_releases_camera() {
    let capability = ScriptedCapability::headless();
    let mut config = create_test_config();
    config.decoder.simulate_unattended = false;
    let mut scanner = Scanner::new(Arc::new(capability.clone()), &config);
    let (controls, inputs) = ScanControls::pair();

    let handle = tokio::spawn(async move { scanner.run(None, inputs).await });
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(capability.releases(), 0);

    controls.cancel();
    controls.cancel();
    let report = handle.await.unwrap();
    assert_eq!(report.outcome, Outcome::Cancelled);
    assert_eq!(capability.releases(), 1);
    assert_eq!(capability.stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_headless_without_any_payload_source_ends_with_error() {
    let capability = ScriptedCapability::headless();
    let mut config = create_test_config();
    config.decoder.simulate_unattended = false;
    let mut scanner = Scanner::new(Arc::new(capability.clone()), &config);

    let outcome = tokio::time::timeout(Duration::from_secs(2), scanner.scan(None))
        .await
        .expect("session must end on its own");
    assert_eq!(outcome.error_kind(), Some(ErrorKind::DecoderFault));
    assert_eq!(capability.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_downgrade_without_any_payload_source_ends_with_error() {
    let capability = ScriptedCapability::new().then_decode(DecodeStep::Fault("detector threw".into()));
    let mut config = create_test_config();
    config.decoder.simulate_unattended = false;
    let mut scanner = Scanner::new(Arc::new(capability.clone()), &config);

    let report = tokio::time::timeout(
        Duration::from_secs(2),
        scanner.run(None, ScanInputs::detached()),
    )
    .await
    .expect("session must end on its own");
    assert_eq!(report.outcome.error_kind(), Some(ErrorKind::DecoderFault));
    assert!(report.uses_fallback_decoder);
    assert_eq!(capability.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_payload_after_latch_is_flagged_as_duplicate() {
    let capability = ScriptedCapability::new();
    let scanner = scanner_with(&capability);
    let mut session = ScanSession::new();

    let first = RawPayload::new("visitor:1:1", PayloadOrigin::Native).unwrap();
    let second = RawPayload::new("visitor:2:2", PayloadOrigin::Manual).unwrap();
    assert!(matches!(
        scanner.found(&mut session, first),
        super::scanner::Scanned::Payload(_)
    ));
    assert!(matches!(
        scanner.found(&mut session, second),
        super::scanner::Scanned::Duplicate
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_validation() {
    let capability = ScriptedCapability::new().then_decode(DecodeStep::Payload("778899".into()));
    let validator = StubValidator::new(Reply::Hang);
    let mut scanner = scanner_with(&capability).with_validator(validator.clone());
    let (controls, inputs) = ScanControls::pair();

    let handle = tokio::spawn(async move { scanner.run(Some("token"), inputs).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(validator.calls().len(), 1);
    // Camera is already gone while the server is being asked
    assert_eq!(capability.releases(), 1);

    controls.cancel();
    let report = handle.await.unwrap();
    assert_eq!(report.outcome, Outcome::Cancelled);
    assert_eq!(capability.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_payload_per_session() {
    let capability = ScriptedCapability::new()
        .then_decode(DecodeStep::Payload("visitor:1:1".into()))
        .then_decode(DecodeStep::Payload("visitor:2:2".into()));
    let events = EventBus::new(32);
    let mut rx = events.subscribe();
    let mut scanner = scanner_with(&capability).with_event_bus(events);
    let (controls, inputs) = ScanControls::pair();
    controls.try_submit_manual("visitor:3:3");

    let report = scanner.run(None, inputs).await;
    assert!(matches!(report.outcome, Outcome::NavigateTo(_)));

    let mut found = 0;
    let mut outcomes = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            ScanEvent::PayloadFound { .. } => found += 1,
            ScanEvent::OutcomeEmitted { .. } => outcomes += 1,
            _ => {}
        }
    }
    assert_eq!(found, 1);
    assert_eq!(outcomes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_share_link_for_navigation() {
    let capability = ScriptedCapability::new()
        .with_sharing()
        .then_decode(DecodeStep::Payload("visitor-abc123".into()));
    let mut scanner = scanner_with(&capability);

    let report = scanner.run(None, ScanInputs::detached()).await;
    assert_eq!(
        report.share_link.as_deref(),
        Some("gatepass://visitor/abc123/badge")
    );
}

#[test]
fn test_session_latch() {
    let mut session = ScanSession::new();
    assert_eq!(session.state(), SessionState::Opening);
    assert!(session.begin_processing());
    assert!(!session.begin_processing());
    assert_eq!(session.state(), SessionState::Processing);
    assert!(!session.release_camera());
    assert!(!session.has_camera());
}
