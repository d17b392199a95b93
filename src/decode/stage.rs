use crate::capability::Capability;
use crate::error::DecodeError;
use crate::events::PayloadOrigin;
use crate::frame::FrameData;
use crate::interpret::RawPayload;
use tracing::{debug, info, trace, warn};

/// Decode stage lifecycle. A native fault is not a state of its own: the
/// stage switches to fallback and stays in `Scanning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Idle,
    Scanning,
    PayloadFound,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderStrategy {
    /// Per-frame decoding by the platform detector
    Native,
    /// Manual entry or unattended synthesis
    Fallback,
}

impl DecoderStrategy {
    /// Pick the strategy for a new session
    pub fn select(native_available: bool, prefer_native: bool) -> Self {
        if native_available && prefer_native {
            DecoderStrategy::Native
        } else {
            DecoderStrategy::Fallback
        }
    }
}

/// Result of one redraw tick
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing decoded this tick
    Pending,
    Found(RawPayload),
    /// The native decoder faulted; the stage now uses fallback
    Downgraded(DecodeError),
}

pub struct DecodeStage {
    state: DecodeState,
    strategy: DecoderStrategy,
    attempts: u64,
    last_fault: Option<DecodeError>,
}

impl DecodeStage {
    pub fn new(strategy: DecoderStrategy) -> Self {
        Self {
            state: DecodeState::Idle,
            strategy,
            attempts: 0,
            last_fault: None,
        }
    }

    /// Begin scanning; only valid from `Idle`
    pub fn start(&mut self) {
        if self.state == DecodeState::Idle {
            info!("Decode stage scanning with {:?} strategy", self.strategy);
            self.state = DecodeState::Scanning;
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn strategy(&self) -> DecoderStrategy {
        self.strategy
    }

    pub fn uses_fallback(&self) -> bool {
        self.strategy == DecoderStrategy::Fallback
    }

    /// Native decode attempts made so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn last_fault(&self) -> Option<&DecodeError> {
        self.last_fault.as_ref()
    }

    /// Attempt one decode of the latest frame
    pub fn tick(&mut self, capability: &dyn Capability, frame: Option<&FrameData>) -> TickOutcome {
        if self.state != DecodeState::Scanning || self.strategy != DecoderStrategy::Native {
            return TickOutcome::Pending;
        }

        let Some(frame) = frame else {
            trace!("No new frame this tick");
            return TickOutcome::Pending;
        };

        self.attempts += 1;
        match capability.decode_frame(frame) {
            Ok(Some(text)) => match RawPayload::new(text, PayloadOrigin::Native) {
                Some(payload) => {
                    debug!("Decoded payload from frame {}", frame.id);
                    self.state = DecodeState::PayloadFound;
                    TickOutcome::Found(payload)
                }
                None => TickOutcome::Pending,
            },
            Ok(None) => TickOutcome::Pending,
            Err(e) => {
                warn!(
                    "Native decoder failed on frame {}, switching to fallback: {}",
                    frame.id, e
                );
                self.strategy = DecoderStrategy::Fallback;
                self.last_fault = Some(e.clone());
                TickOutcome::Downgraded(e)
            }
        }
    }

    /// Accept a payload from manual entry or synthesis.
    /// Only the first payload of a scanning stage gets through.
    pub fn offer(&mut self, payload: RawPayload) -> Option<RawPayload> {
        if self.state != DecodeState::Scanning {
            debug!(
                "Ignoring {} payload in state {:?}",
                payload.origin().as_str(),
                self.state
            );
            return None;
        }

        self.state = DecodeState::PayloadFound;
        Some(payload)
    }

    /// Stop scanning. Returns false when the stage had already finished.
    pub fn cancel(&mut self) -> bool {
        match self.state {
            DecodeState::Idle | DecodeState::Scanning => {
                self.state = DecodeState::Cancelled;
                true
            }
            DecodeState::PayloadFound | DecodeState::Cancelled => false,
        }
    }
}
