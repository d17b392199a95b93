use super::controls::ScanInputs;
use super::state::ScanSession;
use crate::api::ValidationClient;
use crate::capability::{CameraRequest, Capability};
use crate::capture::open_camera;
use crate::config::{CameraConfig, DecoderConfig, GatepassConfig};
use crate::decode::{DecodeStage, DecoderStrategy, FallbackInput, FallbackInputs, TickOutcome};
use crate::error::{CameraError, ErrorKind};
use crate::events::{EventBus, PayloadOrigin, ScanEvent};
use crate::interpret::{classify, parse_payload, route, Outcome, RawPayload, ValidationResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Summary of a finished session for hosts that want more than the outcome
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub session_id: Uuid,
    pub outcome: Outcome,
    pub uses_fallback_decoder: bool,
    pub last_error: Option<ErrorKind>,
    /// Badge link for a navigated visitor when the platform can share
    pub share_link: Option<String>,
}

/// Runs scan sessions against a capability set
pub struct Scanner {
    capability: Arc<dyn Capability>,
    validator: Option<Arc<dyn ValidationClient>>,
    camera: CameraConfig,
    decoder: DecoderConfig,
    events: EventBus,
}

#[derive(Debug)]
pub(super) enum Scanned {
    Payload(RawPayload),
    Failed(Outcome),
    Cancelled,
    /// A second payload arrived while one was already being handled
    Duplicate,
}

impl Scanner {
    pub fn new(capability: Arc<dyn Capability>, config: &GatepassConfig) -> Self {
        let events = if config.system.debug_events {
            EventBus::with_debug_logging(config.system.event_bus_capacity)
        } else {
            EventBus::new(config.system.event_bus_capacity)
        };

        Self {
            capability,
            validator: None,
            camera: config.camera.clone(),
            decoder: config.decoder.clone(),
            events,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn ValidationClient>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Scan without host-driven manual entry or cancellation
    pub async fn scan(&mut self, credential: Option<&str>) -> Outcome {
        self.run(credential, ScanInputs::detached()).await.outcome
    }

    /// Run one session to its single terminal outcome.
    ///
    /// The camera is released before this returns on every path. Taking
    /// `&mut self` keeps sessions of one scanner from overlapping.
    pub async fn run(&mut self, credential: Option<&str>, inputs: ScanInputs) -> ScanReport {
        let mut session = ScanSession::new();
        let session_id = session.id();
        info!(session = %session_id, "Scan session started");
        self.publish(ScanEvent::SessionStarted {
            session_id,
            timestamp: SystemTime::now(),
        });

        let ScanInputs { cancel, manual } = inputs;
        let mut fallback = FallbackInputs::new(manual);

        let outcome = match self.acquire(&mut session, &cancel, &mut fallback).await {
            Scanned::Payload(payload) => {
                if self.release(&mut session) {
                    debug!(session = %session_id, "Camera released before interpretation");
                }
                self.interpret(&mut session, payload, credential, &cancel).await
            }
            Scanned::Failed(outcome) => outcome,
            Scanned::Cancelled => Outcome::Cancelled,
            Scanned::Duplicate => {
                error!(session = %session_id, "Payload produced after the session latched");
                Outcome::error(
                    ErrorKind::DecoderFault,
                    "A payload was already being processed",
                )
            }
        };

        fallback.disarm_synthesis();
        self.release(&mut session);
        session.finish(outcome == Outcome::Cancelled);

        self.publish(ScanEvent::OutcomeEmitted {
            session_id,
            outcome: outcome.label().to_string(),
            error: outcome.error_kind(),
        });

        let share_link = self.share_link(&outcome);
        ScanReport {
            session_id,
            outcome,
            uses_fallback_decoder: session.uses_fallback_decoder(),
            last_error: session.last_error(),
            share_link,
        }
    }

    /// Badge link for a navigation outcome, when sharing is possible
    pub fn share_link(&self, outcome: &Outcome) -> Option<String> {
        match outcome {
            Outcome::NavigateTo(reference) if self.capability.shareable() => {
                self.capability.share_link(reference.identifier())
            }
            _ => None,
        }
    }

    /// Open the camera and poll until exactly one payload is produced
    async fn acquire(
        &self,
        session: &mut ScanSession,
        cancel: &tokio_util::sync::CancellationToken,
        fallback: &mut FallbackInputs,
    ) -> Scanned {
        let session_id = session.id();
        let request = CameraRequest::environment(&self.camera);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Scanned::Cancelled,
            result = open_camera(self.capability.as_ref(), &request) => result,
        };

        let camera = match opened {
            Ok(camera) => camera,
            Err(e) => {
                error!(session = %session_id, "Camera unavailable: {}", e);
                session.record_error(ErrorKind::CameraUnavailable);
                return Scanned::Failed(Outcome::error(
                    ErrorKind::CameraUnavailable,
                    e.user_message(),
                ));
            }
        };

        self.publish(ScanEvent::CameraOpened {
            session_id,
            resolution: camera.resolution(),
        });
        session.attach_camera(camera);

        let strategy = DecoderStrategy::select(
            self.capability.has_native_decoder(),
            self.decoder.prefer_native,
        );
        let mut stage = DecodeStage::new(strategy);
        stage.start();
        if stage.uses_fallback() {
            session.set_fallback();
            self.arm_synthesis(fallback);
        }

        let mut ticker = tokio::time::interval(self.decoder.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if stage.uses_fallback() && fallback.is_exhausted() && !cancel.is_cancelled() {
                return self.sources_exhausted(session);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stage.cancel();
                    info!(session = %session_id, "Scan cancelled while scanning");
                    return Scanned::Cancelled;
                }
                input = fallback.next(), if !fallback.is_exhausted() => {
                    let (text, origin) = match input {
                        FallbackInput::Manual(text) => (text, PayloadOrigin::Manual),
                        FallbackInput::Simulated(text) => (text, PayloadOrigin::Simulated),
                        FallbackInput::Exhausted => continue,
                    };
                    let Some(payload) = RawPayload::new(text, origin) else {
                        debug!(session = %session_id, "Ignoring empty {} input", origin.as_str());
                        continue;
                    };
                    if let Some(payload) = stage.offer(payload) {
                        return self.found(session, payload);
                    }
                }
                _ = ticker.tick(), if !stage.uses_fallback() => {
                    let frame = match session.camera_mut().map(|camera| camera.latest_frame()) {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => return self.camera_lost(session, e),
                        None => None,
                    };

                    match stage.tick(self.capability.as_ref(), frame.as_ref()) {
                        TickOutcome::Pending => trace!(session = %session_id, "Tick without payload"),
                        TickOutcome::Found(payload) => return self.found(session, payload),
                        TickOutcome::Downgraded(fault) => {
                            session.set_fallback();
                            session.record_error(ErrorKind::DecoderFault);
                            self.publish(ScanEvent::StrategyDowngraded {
                                session_id,
                                reason: fault.to_string(),
                            });
                            self.arm_synthesis(fallback);
                        }
                    }
                }
            }
        }
    }

    pub(super) fn found(&self, session: &mut ScanSession, payload: RawPayload) -> Scanned {
        if !session.begin_processing() {
            warn!(session = %session.id(), "Dropping payload, one is already in flight");
            return Scanned::Duplicate;
        }

        info!(
            session = %session.id(),
            origin = payload.origin().as_str(),
            "Payload found"
        );
        self.publish(ScanEvent::PayloadFound {
            session_id: session.id(),
            origin: payload.origin(),
            timestamp: SystemTime::now(),
        });
        Scanned::Payload(payload)
    }

    /// Fallback decoding with manual entry closed and no synthesis pending
    fn sources_exhausted(&self, session: &mut ScanSession) -> Scanned {
        warn!(
            session = %session.id(),
            "No QR decoder, manual entry closed and unattended synthesis disabled"
        );
        session.record_error(ErrorKind::DecoderFault);
        Scanned::Failed(Outcome::error(
            ErrorKind::DecoderFault,
            "No payload source available: no QR decoder, manual entry or unattended synthesis",
        ))
    }

    fn camera_lost(&self, session: &mut ScanSession, e: CameraError) -> Scanned {
        error!(session = %session.id(), "Camera stream lost: {}", e);
        session.record_error(ErrorKind::CameraUnavailable);
        Scanned::Failed(Outcome::error(ErrorKind::CameraUnavailable, e.user_message()))
    }

    fn arm_synthesis(&self, fallback: &mut FallbackInputs) {
        if self.decoder.simulate_unattended && !fallback.synthesis_armed() {
            fallback.arm_synthesis(self.decoder.fallback_delay_window());
        }
    }

    /// Parse, optionally validate, and route a payload
    async fn interpret(
        &self,
        session: &mut ScanSession,
        payload: RawPayload,
        credential: Option<&str>,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Outcome {
        let session_id = session.id();
        let parsed = match parse_payload(payload.as_str()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(session = %session_id, "Payload not recognized: {}", e);
                session.record_error(ErrorKind::UnrecognizedPayload);
                return e.into();
            }
        };
        debug!(
            session = %session_id,
            "Parsed identifier {} via {:?}",
            parsed.identifier, parsed.rule
        );

        let credential = credential.filter(|c| !c.trim().is_empty());
        let validation = match (credential, self.validator.as_ref()) {
            (Some(credential), Some(validator)) => {
                let response = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(session = %session_id, "Scan cancelled during validation");
                        return Outcome::Cancelled;
                    }
                    response = validator.validate(payload.as_str(), credential) => response,
                };

                let result = classify(response);
                match &result {
                    ValidationResult::Unreachable { .. } => {
                        session.record_error(ErrorKind::ValidationUnreachable)
                    }
                    ValidationResult::Denied { .. } => {
                        session.record_error(ErrorKind::ValidationDenied)
                    }
                    ValidationResult::Granted(_) => {}
                }
                self.publish(ScanEvent::ValidationCompleted {
                    session_id,
                    result: result.label().to_string(),
                });
                Some(result)
            }
            (Some(_), None) => {
                debug!(session = %session_id, "No validation client, routing locally");
                None
            }
            (None, _) => None,
        };

        route(&parsed, validation)
    }

    fn release(&self, session: &mut ScanSession) -> bool {
        let released = session.release_camera();
        if released {
            self.publish(ScanEvent::CameraReleased {
                session_id: session.id(),
            });
        }
        released
    }

    fn publish(&self, event: ScanEvent) {
        if let Err(e) = self.events.publish(event) {
            trace!("Event not delivered: {}", e);
        }
    }
}
