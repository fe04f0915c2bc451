//! Built-in subscribers.

pub mod audit;
pub mod notifications;

pub use audit::AuditLogSubscriber;
pub use notifications::{
    CollaboratorNotificationSubscriber, InMemoryNotificationInbox, Notification, NotificationInbox,
    NotificationKind,
};
