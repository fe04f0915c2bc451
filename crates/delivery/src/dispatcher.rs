//! Fan-out of one event to every subscriber registered for its type.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use domain::EventType;
use futures_util::FutureExt;

use crate::error::SubscriberError;
use crate::subscriber::{EventEnvelope, Subscriber};

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every subscriber handled the event, or none is registered.
    Success,
    /// A subscriber failed; the event should be retried later.
    RetryableFailure(String),
    /// A subscriber rejected the event for good.
    Fatal(String),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success)
    }
}

/// Subscribers keyed by event type, kept in registration order.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: HashMap<EventType, Vec<Arc<dyn Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for one event type.
    pub fn register(&mut self, event_type: EventType, subscriber: Arc<dyn Subscriber>) {
        self.subscribers
            .entry(event_type)
            .or_default()
            .push(subscriber);
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, event_type: EventType, subscriber: Arc<dyn Subscriber>) -> Self {
        self.register(event_type, subscriber);
        self
    }

    /// Returns the subscribers of `event_type` in registration order.
    pub fn subscribers_for(&self, event_type: EventType) -> &[Arc<dyn Subscriber>] {
        self.subscribers
            .get(&event_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the total number of registrations.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.values().map(Vec::len).sum()
    }

    /// Invokes every subscriber of the event's type, in registration order.
    ///
    /// Stops at the first failure. Subscribers that ran before it are not
    /// rolled back and will see the event again on the next attempt. A
    /// panicking subscriber counts as a retryable failure.
    #[tracing::instrument(skip(self, envelope), fields(
        record_id = %envelope.record_id,
        event_type = %envelope.event.event_type(),
    ))]
    pub async fn dispatch(&self, envelope: &EventEnvelope) -> DispatchOutcome {
        for subscriber in self.subscribers_for(envelope.event.event_type()) {
            let result = match AssertUnwindSafe(subscriber.handle(envelope))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(&*panic);
                    tracing::error!(
                        subscriber = subscriber.name(),
                        panic = %message,
                        "subscriber panicked"
                    );
                    return DispatchOutcome::RetryableFailure(format!(
                        "{}: panicked: {message}",
                        subscriber.name()
                    ));
                }
            };
            match result {
                Ok(()) => {}
                Err(SubscriberError::Retryable(reason)) => {
                    tracing::warn!(subscriber = subscriber.name(), %reason, "subscriber failed");
                    return DispatchOutcome::RetryableFailure(format!(
                        "{}: {reason}",
                        subscriber.name()
                    ));
                }
                Err(SubscriberError::Fatal(reason)) => {
                    tracing::error!(subscriber = subscriber.name(), %reason, "subscriber rejected event");
                    return DispatchOutcome::Fatal(format!("{}: {reason}", subscriber.name()));
                }
            }
        }
        DispatchOutcome::Success
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (event_type, subscribers) in &self.subscribers {
            let names: Vec<_> = subscribers.iter().map(|s| s.name()).collect();
            map.entry(&event_type.as_str(), &names);
        }
        map.finish()
    }
}
