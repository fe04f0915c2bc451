//! Notifies users when they join or leave a mission.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, UserId};
use domain::{DomainEvent, EventType};
use outbox_store::OutboxId;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::dispatcher::SubscriberRegistry;
use crate::error::SubscriberError;
use crate::subscriber::{EventEnvelope, Subscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NotificationKind {
    AddedToMission,
    RemovedFromMission,
}

/// A message for one user, derived from one outbox record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Outbox record the notification was derived from.
    pub source_record: OutboxId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub mission_id: AggregateId,
    pub created_at: DateTime<Utc>,
}

/// Destination of notifications.
///
/// Implementations must deduplicate on `(source_record, recipient)` so that a
/// redelivered event never notifies the same user twice.
#[async_trait]
pub trait NotificationInbox: Send + Sync {
    /// Stores a notification. Returns false if it was already stored.
    async fn deliver(&self, notification: Notification) -> Result<bool, SubscriberError>;
}

#[derive(Default)]
struct InboxState {
    seen: HashSet<(OutboxId, UserId)>,
    notifications: Vec<Notification>,
}

/// In-memory inbox for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryNotificationInbox {
    state: Arc<RwLock<InboxState>>,
}

impl InMemoryNotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored notification in delivery order.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    /// Returns the notifications addressed to `recipient`.
    pub async fn notifications_for(&self, recipient: UserId) -> Vec<Notification> {
        self.state
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationInbox for InMemoryNotificationInbox {
    async fn deliver(&self, notification: Notification) -> Result<bool, SubscriberError> {
        let mut state = self.state.write().await;
        if !state
            .seen
            .insert((notification.source_record, notification.recipient))
        {
            return Ok(false);
        }
        state.notifications.push(notification);
        Ok(true)
    }
}

/// Tells collaborators they were added to or removed from a mission.
pub struct CollaboratorNotificationSubscriber<I: NotificationInbox> {
    inbox: I,
}

impl<I: NotificationInbox + 'static> CollaboratorNotificationSubscriber<I> {
    pub fn new(inbox: I) -> Self {
        Self { inbox }
    }

    /// Event types this subscriber reacts to.
    pub const EVENT_TYPES: [EventType; 2] =
        [EventType::CollaboratorAdded, EventType::CollaboratorRemoved];

    /// Registers one shared instance for every handled event type.
    pub fn register(self, registry: &mut SubscriberRegistry) {
        let subscriber: Arc<dyn Subscriber> = Arc::new(self);
        for event_type in Self::EVENT_TYPES {
            registry.register(event_type, Arc::clone(&subscriber));
        }
    }
}

#[async_trait]
impl<I: NotificationInbox> Subscriber for CollaboratorNotificationSubscriber<I> {
    fn name(&self) -> &'static str {
        "collaborator_notifications"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), SubscriberError> {
        let (recipient, kind, mission_id) = match &envelope.event {
            DomainEvent::CollaboratorAdded(e) => {
                (e.collaborator_id, NotificationKind::AddedToMission, e.mission_id)
            }
            DomainEvent::CollaboratorRemoved(e) => (
                e.collaborator_id,
                NotificationKind::RemovedFromMission,
                e.mission_id,
            ),
            _ => return Ok(()),
        };

        let delivered = self
            .inbox
            .deliver(Notification {
                source_record: envelope.record_id,
                recipient,
                kind,
                mission_id,
                created_at: envelope.occurred_at,
            })
            .await?;

        if delivered {
            tracing::debug!(%recipient, ?kind, %mission_id, "notification delivered");
        } else {
            tracing::debug!(record_id = %envelope.record_id, "duplicate delivery ignored");
        }
        Ok(())
    }
}
