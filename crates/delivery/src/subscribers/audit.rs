//! Structured log line per delivered event.

use std::sync::Arc;

use async_trait::async_trait;
use domain::EventType;

use crate::dispatcher::SubscriberRegistry;
use crate::error::SubscriberError;
use crate::subscriber::{EventEnvelope, Subscriber};

/// Logs every delivered event and counts deliveries per type.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLogSubscriber;

impl AuditLogSubscriber {
    /// Registers the subscriber for every event type.
    pub fn register(registry: &mut SubscriberRegistry) {
        let subscriber: Arc<dyn Subscriber> = Arc::new(Self);
        for event_type in EventType::ALL {
            registry.register(event_type, Arc::clone(&subscriber));
        }
    }
}

#[async_trait]
impl Subscriber for AuditLogSubscriber {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), SubscriberError> {
        let event_type = envelope.event.event_type();
        tracing::info!(
            record_id = %envelope.record_id,
            %event_type,
            aggregate_id = %envelope.event.aggregate_id(),
            attempt = envelope.attempt,
            occurred_at = %envelope.occurred_at,
            "domain event delivered"
        );
        metrics::counter!("outbox_events_delivered_total", "event_type" => event_type.as_str())
            .increment(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_for_every_event_type() {
        let mut registry = SubscriberRegistry::new();
        AuditLogSubscriber::register(&mut registry);

        assert_eq!(registry.subscriber_count(), EventType::ALL.len());
        for event_type in EventType::ALL {
            assert_eq!(registry.subscribers_for(event_type)[0].name(), "audit_log");
        }
    }
}
