//! Delivery side of the transactional outbox.
//!
//! This crate drives outbox records to in-process subscribers:
//! - [`Subscriber`] trait and the [`SubscriberRegistry`] fan-out dispatcher
//! - [`RetryPolicy`] with capped exponential backoff
//! - [`OutboxProcessor`], the per-batch retry/dead-letter state machine
//! - [`OutboxPoller`], the cancellation-aware background loop
//! - [`OutboxHealthCheck`], dead-letter and backlog-age observability

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod poller;
pub mod processor;
pub mod retry;
pub mod subscriber;
pub mod subscribers;

pub use config::{HealthCheckOptions, OutboxOptions};
pub use dispatcher::{DispatchOutcome, SubscriberRegistry};
pub use error::{DeliveryError, Result, SubscriberError};
pub use health::{HealthReport, HealthStatus, OutboxHealthCheck};
pub use poller::OutboxPoller;
pub use processor::{BatchSummary, OutboxProcessor, Transition};
pub use retry::RetryPolicy;
pub use subscriber::{EventEnvelope, Subscriber};
pub use subscribers::{
    AuditLogSubscriber, CollaboratorNotificationSubscriber, InMemoryNotificationInbox,
    Notification, NotificationInbox, NotificationKind,
};
