//! Post-commit notification dispatch
//!
//! Workflow transitions publish a [`Notification`] after their unit of work
//! commits. Publishing only pushes onto an unbounded channel; delivery happens
//! on a separate [`NotificationWorker`] task that hands each message to a
//! [`NotificationSink`]. A failed send or delivery is logged and dropped, it
//! never fails or rolls back the transition that produced it.
//!
//! # Architecture
//!
//! ```text
//! BookingWorkflow / RideInventory
//!     └── Notifier::publish ──mpsc──> NotificationWorker ──> dyn NotificationSink
//! ```

use crate::types::{BookingId, RideId, UserId};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Sent to the driver
    BookingRequested,
    /// Sent to the passenger
    BookingApproved,
    /// Sent to the passenger
    BookingRejected,
    /// Sent to the other party of a cancelled booking
    BookingCancelled,
    /// Sent to every passenger of a completed ride
    RideCompleted,
    /// Sent to every passenger affected by a ride cancellation
    RideCancelled,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationKind::BookingRequested => "BOOKING_REQUESTED",
            NotificationKind::BookingApproved => "BOOKING_APPROVED",
            NotificationKind::BookingRejected => "BOOKING_REJECTED",
            NotificationKind::BookingCancelled => "BOOKING_CANCELLED",
            NotificationKind::RideCompleted => "RIDE_COMPLETED",
            NotificationKind::RideCancelled => "RIDE_CANCELLED",
        };
        f.write_str(name)
    }
}

/// Message for one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: UserId,
    pub ride: RideId,
    pub booking: Option<BookingId>,
    /// Human readable text
    pub payload: String,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        recipient: UserId,
        ride: RideId,
        booking: Option<BookingId>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            recipient,
            ride,
            booking,
            payload: payload.into(),
        }
    }
}

/// Delivery failure reported by a sink
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to deliver {kind} to user {recipient}: {reason}")]
pub struct DeliveryError {
    pub kind: NotificationKind,
    pub recipient: UserId,
    pub reason: String,
}

/// Delivery transport
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Sink that only logs each delivery
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            kind = %notification.kind,
            recipient = notification.recipient,
            ride = notification.ride,
            booking = ?notification.booking,
            "{}",
            notification.payload
        );
        Ok(())
    }
}

/// Publishing half of the notification channel
///
/// Cheap to clone; every component that emits notifications holds one.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: UnboundedSender<Notification>,
}

impl Notifier {
    /// Create a notifier and the worker that drains it into `sink`
    pub fn channel(sink: Arc<dyn NotificationSink>) -> (Self, NotificationWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, NotificationWorker { receiver, sink })
    }

    /// Queue a notification
    ///
    /// Never fails: a closed channel is logged and the message dropped.
    pub fn publish(&self, notification: Notification) {
        if let Err(err) = self.sender.send(notification) {
            warn!(
                kind = %err.0.kind,
                recipient = err.0.recipient,
                "notification channel closed, dropping message"
            );
        }
    }

    pub fn publish_all<I>(&self, notifications: I)
    where
        I: IntoIterator<Item = Notification>,
    {
        for notification in notifications {
            self.publish(notification);
        }
    }
}

/// Receiving half: delivers queued notifications to a sink
pub struct NotificationWorker {
    receiver: UnboundedReceiver<Notification>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationWorker {
    /// Deliver until every [`Notifier`] clone is dropped
    ///
    /// Returns the number of notifications delivered successfully.
    pub async fn run(mut self) -> usize {
        let mut delivered = 0;
        while let Some(notification) = self.receiver.recv().await {
            match self.sink.deliver(&notification).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!(error = %err, "notification delivery failed"),
            }
        }
        delivered
    }
}

impl fmt::Debug for NotificationWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationWorker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
            self.seen.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
            Err(DeliveryError {
                kind: notification.kind,
                recipient: notification.recipient,
                reason: "smtp down".to_string(),
            })
        }
    }

    fn approved(recipient: UserId) -> Notification {
        Notification::new(
            NotificationKind::BookingApproved,
            recipient,
            1,
            Some(1),
            "approved",
        )
    }

    #[tokio::test]
    async fn test_worker_delivers_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let (notifier, worker) = Notifier::channel(sink.clone());

        notifier.publish(approved(1));
        notifier.publish(approved(2));
        drop(notifier);

        assert_eq!(worker.run().await, 2);
        let recipients: Vec<UserId> = sink
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.recipient)
            .collect();
        assert_eq!(recipients, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_delivery_failures_are_swallowed() {
        let (notifier, worker) = Notifier::channel(Arc::new(FailingSink));

        notifier.publish_all(vec![approved(1), approved(2)]);
        drop(notifier);

        assert_eq!(worker.run().await, 0);
    }

    #[test]
    fn test_publish_after_worker_dropped_does_not_panic() {
        let (notifier, worker) = Notifier::channel(Arc::new(TracingSink));
        drop(worker);

        notifier.publish(approved(3));
    }
}
