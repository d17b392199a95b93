//! Fallback payload sources: operator entry racing an unattended synthesis
//! timer. Both are single-shot events merged into one stream; manual entry
//! always wins and cancels the timer.

use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::{debug, info};
use uuid::Uuid;

/// Range of visitor ids used for synthesized payloads
const SIMULATED_ID_MIN: u64 = 100_000;
const SIMULATED_ID_MAX: u64 = 999_999;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackInput {
    Manual(String),
    Simulated(String),
    /// Manual entry is closed and no synthesis is pending
    Exhausted,
}

fn random_u64() -> u64 {
    Uuid::new_v4().as_u128() as u64
}

/// Uniformly random delay within `[min, max]`
pub fn jittered_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span = (max - min).as_millis() as u64;
    min + Duration::from_millis(random_u64() % (span + 1))
}

/// Payload in the canonical `visitor:<numericId>:<timestamp>` shape
pub fn synthesize_payload() -> String {
    let id = SIMULATED_ID_MIN + random_u64() % (SIMULATED_ID_MAX - SIMULATED_ID_MIN + 1);
    format!("visitor:{}:{}", id, chrono::Utc::now().timestamp_millis())
}

/// Cancellable single-shot timer
#[derive(Default)]
pub struct SynthesisTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl SynthesisTimer {
    pub fn new() -> Self {
        Self { sleep: None }
    }

    /// Arm (or re-arm) the timer
    pub fn arm(&mut self, delay: Duration) {
        self.sleep = Some(Box::pin(tokio::time::sleep(delay)));
    }

    /// Returns true if a pending timer was cleared
    pub fn disarm(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves once when the armed timer elapses; never resolves while disarmed
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// Merged stream of fallback inputs
pub struct FallbackInputs {
    manual: mpsc::Receiver<String>,
    manual_open: bool,
    timer: SynthesisTimer,
}

impl FallbackInputs {
    pub fn new(manual: mpsc::Receiver<String>) -> Self {
        Self {
            manual,
            manual_open: true,
            timer: SynthesisTimer::new(),
        }
    }

    /// Schedule unattended synthesis after a random delay in `window`
    pub fn arm_synthesis(&mut self, window: (Duration, Duration)) -> Duration {
        let delay = jittered_delay(window.0, window.1);
        info!("Unattended payload synthesis in {:?}", delay);
        self.timer.arm(delay);
        delay
    }

    pub fn disarm_synthesis(&mut self) -> bool {
        self.timer.disarm()
    }

    pub fn synthesis_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// No source left that could still produce a payload
    pub fn is_exhausted(&self) -> bool {
        !self.manual_open && !self.timer.is_armed()
    }

    /// Next manual or simulated payload, or `Exhausted` once neither can
    /// arrive. Cancel-safe.
    pub async fn next(&mut self) -> FallbackInput {
        loop {
            if self.is_exhausted() {
                return FallbackInput::Exhausted;
            }
            tokio::select! {
                biased;
                text = self.manual.recv(), if self.manual_open => match text {
                    Some(text) => {
                        if self.timer.disarm() {
                            debug!("Manual entry cancelled pending synthesis");
                        }
                        return FallbackInput::Manual(text);
                    }
                    None => {
                        debug!("Manual entry channel closed");
                        self.manual_open = false;
                    }
                },
                _ = self.timer.fired() => {
                    return FallbackInput::Simulated(synthesize_payload());
                }
            }
        }
    }
}
