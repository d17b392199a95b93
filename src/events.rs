use crate::error::{ErrorKind, EventBusError};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a raw payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadOrigin {
    /// Decoded from a camera frame by the native detector
    Native,
    /// Typed in by the operator
    Manual,
    /// Synthesized by the unattended fallback
    Simulated,
}

impl PayloadOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadOrigin::Native => "native",
            PayloadOrigin::Manual => "manual",
            PayloadOrigin::Simulated => "simulated",
        }
    }
}

/// Events published while a scan session runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    SessionStarted {
        session_id: Uuid,
        timestamp: SystemTime,
    },
    CameraOpened {
        session_id: Uuid,
        resolution: (u32, u32),
    },
    CameraReleased {
        session_id: Uuid,
    },
    /// The native decoder failed and the session switched to fallback
    StrategyDowngraded {
        session_id: Uuid,
        reason: String,
    },
    PayloadFound {
        session_id: Uuid,
        origin: PayloadOrigin,
        timestamp: SystemTime,
    },
    ValidationCompleted {
        session_id: Uuid,
        result: String,
    },
    OutcomeEmitted {
        session_id: Uuid,
        outcome: String,
        error: Option<ErrorKind>,
    },
}

impl ScanEvent {
    pub fn session_id(&self) -> Uuid {
        match self {
            ScanEvent::SessionStarted { session_id, .. }
            | ScanEvent::CameraOpened { session_id, .. }
            | ScanEvent::CameraReleased { session_id }
            | ScanEvent::StrategyDowngraded { session_id, .. }
            | ScanEvent::PayloadFound { session_id, .. }
            | ScanEvent::ValidationCompleted { session_id, .. }
            | ScanEvent::OutcomeEmitted { session_id, .. } => *session_id,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ScanEvent::SessionStarted { .. } => "Scan session started".to_string(),
            ScanEvent::CameraOpened { resolution, .. } => {
                format!("Camera opened at {}x{}", resolution.0, resolution.1)
            }
            ScanEvent::CameraReleased { .. } => "Camera released".to_string(),
            ScanEvent::StrategyDowngraded { reason, .. } => {
                format!("Switched to fallback decoding: {}", reason)
            }
            ScanEvent::PayloadFound { origin, .. } => {
                format!("Payload found ({})", origin.as_str())
            }
            ScanEvent::ValidationCompleted { result, .. } => {
                format!("Validation completed: {}", result)
            }
            ScanEvent::OutcomeEmitted { outcome, .. } => format!("Outcome: {}", outcome),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::SessionStarted { .. } => "session_started",
            ScanEvent::CameraOpened { .. } => "camera_opened",
            ScanEvent::CameraReleased { .. } => "camera_released",
            ScanEvent::StrategyDowngraded { .. } => "strategy_downgraded",
            ScanEvent::PayloadFound { .. } => "payload_found",
            ScanEvent::ValidationCompleted { .. } => "validation_completed",
            ScanEvent::OutcomeEmitted { .. } => "outcome_emitted",
        }
    }
}

/// Broadcast bus a host UI can subscribe to for scan progress
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: ScanEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!(session = %event.session_id(), "Publishing event: {}", event.description());
        }

        match &event {
            ScanEvent::StrategyDowngraded { reason, .. } => {
                warn!(session = %event.session_id(), "Decoder downgraded: {}", reason);
            }
            ScanEvent::OutcomeEmitted { outcome, .. } => {
                info!(session = %event.session_id(), "Scan outcome: {}", outcome);
            }
            _ => {}
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    Session(Uuid),
}

impl EventFilter {
    pub fn matches(&self, event: &ScanEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Session(id) => event.session_id() == *id,
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<ScanEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<ScanEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<ScanEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { missed: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<ScanEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { missed: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let session_id = Uuid::new_v4();

        let subscriber_count = event_bus
            .publish(ScanEvent::CameraOpened {
                session_id,
                resolution: (640, 480),
            })
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            ScanEvent::CameraOpened { resolution, .. } => assert_eq!(resolution, (640, 480)),
            other => panic!("Unexpected event type: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(4);
        let result = event_bus.publish(ScanEvent::CameraReleased {
            session_id: Uuid::new_v4(),
        });
        assert!(result.is_err());
        assert!(!event_bus.has_subscribers());
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let wanted = Uuid::new_v4();
        let mut filtered =
            EventReceiver::new(event_bus.subscribe(), EventFilter::Session(wanted), "test".to_string());

        event_bus
            .publish(ScanEvent::SessionStarted {
                session_id: Uuid::new_v4(),
                timestamp: SystemTime::now(),
            })
            .unwrap();
        event_bus
            .publish(ScanEvent::PayloadFound {
                session_id: wanted,
                origin: PayloadOrigin::Manual,
                timestamp: SystemTime::now(),
            })
            .unwrap();

        let event = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "payload_found");
        assert_eq!(event.session_id(), wanted);
        assert!(filtered.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_type_filter() {
        let filter = EventFilter::EventTypes(vec!["outcome_emitted"]);
        let session_id = Uuid::new_v4();

        assert!(filter.matches(&ScanEvent::OutcomeEmitted {
            session_id,
            outcome: "cancelled".to_string(),
            error: None,
        }));
        assert!(!filter.matches(&ScanEvent::CameraReleased { session_id }));
    }
}
