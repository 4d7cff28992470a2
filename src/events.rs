//! Subscribable notification feed for state transitions
//!
//! Every transition is published exactly once, from inside the critical
//! section that committed it. `ClaimChecked` is the one informational event:
//! it is published on every claim check and changes no state, so watchers
//! replaying transitions should filter with [`SuretyEvent::is_transition`].
//! Watchers that lag behind the channel capacity
//! observe `RecvError::Lagged` from tokio and must resynchronise through the
//! read surface.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{Amount, FlightKey, Identity, RequestId, StatusCode};

/// Engine events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuretyEvent {
    OperationalChanged {
        operational: bool,
    },
    AirlineQueued {
        airline: Identity,
        sponsor: Option<Identity>,
    },
    AirlineVoted {
        airline: Identity,
        voter: Identity,
        votes: usize,
        required: usize,
    },
    AirlineRegistered {
        airline: Identity,
        funding: Amount,
    },
    FlightRegistered {
        flight_key: FlightKey,
        airline: Identity,
        designator: String,
    },
    PolicyPurchased {
        flight_key: FlightKey,
        customer: Identity,
        premium: Amount,
    },
    OracleRegistered {
        oracle: Identity,
        indexes: [u8; 3],
    },
    OracleRequest {
        request_id: RequestId,
        flight_key: FlightKey,
        timestamp: u64,
    },
    OracleReport {
        request_id: RequestId,
        oracle: Identity,
        status: StatusCode,
    },
    FlightStatusResolved {
        flight_key: FlightKey,
        status: StatusCode,
    },
    /// Informational. Published on each claim check, repeats included.
    ClaimChecked {
        customer: Identity,
        available: bool,
        amount: Amount,
    },
    PayoutWithdrawn {
        customer: Identity,
        amount: Amount,
    },
}

impl SuretyEvent {
    /// Whether the event records a committed state change.
    pub fn is_transition(&self) -> bool {
        !matches!(self, SuretyEvent::ClaimChecked { .. })
    }
}

/// An event stamped with its position in the global feed order.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: SuretyEvent,
}

pub struct EventFeed {
    sender: broadcast::Sender<EventEnvelope>,
    // Held while sending so that sequence order matches delivery order.
    sequence: Mutex<u64>,
}

impl EventFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Mutex::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: SuretyEvent) {
        let mut sequence = self.sequence.lock();
        *sequence += 1;
        debug!(sequence = *sequence, ?event, "publishing engine event");

        // No subscribers is not an error: the feed is fire-and-forget.
        let _ = self.sender.send(EventEnvelope {
            sequence: *sequence,
            recorded_at: Utc::now(),
            event,
        });
    }

    /// Number of events published so far.
    pub fn published(&self) -> u64 {
        *self.sequence.lock()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let feed = EventFeed::new(8);
        let mut rx = feed.subscribe();

        feed.publish(SuretyEvent::OperationalChanged { operational: false });
        feed.publish(SuretyEvent::PayoutWithdrawn {
            customer: Identity::from("GCUSTOMER"),
            amount: 15,
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.event, SuretyEvent::OperationalChanged { operational: false });
        assert_eq!(feed.published(), 2);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let feed = EventFeed::new(4);
        feed.publish(SuretyEvent::OperationalChanged { operational: true });
        assert_eq!(feed.published(), 1);
    }

    #[test]
    fn test_claim_check_is_not_a_transition() {
        let check = SuretyEvent::ClaimChecked {
            customer: Identity::from("GCUSTOMER"),
            available: false,
            amount: 0,
        };
        let payout = SuretyEvent::PayoutWithdrawn {
            customer: Identity::from("GCUSTOMER"),
            amount: 15,
        };
        assert!(!check.is_transition());
        assert!(payout.is_transition());
        assert!(SuretyEvent::OperationalChanged { operational: true }.is_transition());
    }

    #[test]
    fn test_envelope_serializes_flat() {
        let envelope = EventEnvelope {
            sequence: 7,
            recorded_at: Utc::now(),
            event: SuretyEvent::FlightStatusResolved {
                flight_key: FlightKey::from("abc".to_string()),
                status: StatusCode::LateAirline,
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "flight_status_resolved");
        assert_eq!(json["status"], "late_airline");
        assert_eq!(json["sequence"], 7);
    }
}
