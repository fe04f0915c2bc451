//! Registered domain events and their stable type tags.

use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable schema identifier of every event the pipeline can carry.
///
/// The tag strings are part of the persisted outbox format and must never be
/// renamed; add a new variant instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    MissionCreated,
    MissionRenamed,
    CollaboratorAdded,
    CollaboratorRemoved,
    ObjectiveAdded,
    ObjectiveCompleted,
    MetricValueRecorded,
}

impl EventType {
    /// Every registered event type.
    pub const ALL: [EventType; 7] = [
        EventType::MissionCreated,
        EventType::MissionRenamed,
        EventType::CollaboratorAdded,
        EventType::CollaboratorRemoved,
        EventType::ObjectiveAdded,
        EventType::ObjectiveCompleted,
        EventType::MetricValueRecorded,
    ];

    /// Returns the persisted tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::MissionCreated => "mission.created",
            EventType::MissionRenamed => "mission.renamed",
            EventType::CollaboratorAdded => "mission.collaborator_added",
            EventType::CollaboratorRemoved => "mission.collaborator_removed",
            EventType::ObjectiveAdded => "mission.objective_added",
            EventType::ObjectiveCompleted => "mission.objective_completed",
            EventType::MetricValueRecorded => "mission.metric_value_recorded",
        }
    }

    /// Resolves a persisted tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to an aggregate.
///
/// Events carry only the identifiers a subscriber needs to re-fetch current
/// state, never a snapshot of the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    MissionCreated(MissionCreated),
    MissionRenamed(MissionRenamed),
    CollaboratorAdded(CollaboratorAdded),
    CollaboratorRemoved(CollaboratorRemoved),
    ObjectiveAdded(ObjectiveAdded),
    ObjectiveCompleted(ObjectiveCompleted),
    MetricValueRecorded(MetricValueRecorded),
}

impl DomainEvent {
    /// Returns the registered type of this event.
    pub fn event_type(&self) -> EventType {
        match self {
            DomainEvent::MissionCreated(_) => EventType::MissionCreated,
            DomainEvent::MissionRenamed(_) => EventType::MissionRenamed,
            DomainEvent::CollaboratorAdded(_) => EventType::CollaboratorAdded,
            DomainEvent::CollaboratorRemoved(_) => EventType::CollaboratorRemoved,
            DomainEvent::ObjectiveAdded(_) => EventType::ObjectiveAdded,
            DomainEvent::ObjectiveCompleted(_) => EventType::ObjectiveCompleted,
            DomainEvent::MetricValueRecorded(_) => EventType::MetricValueRecorded,
        }
    }

    /// Returns the aggregate that raised this event.
    pub fn aggregate_id(&self) -> AggregateId {
        match self {
            DomainEvent::MissionCreated(e) => e.mission_id,
            DomainEvent::MissionRenamed(e) => e.mission_id,
            DomainEvent::CollaboratorAdded(e) => e.mission_id,
            DomainEvent::CollaboratorRemoved(e) => e.mission_id,
            DomainEvent::ObjectiveAdded(e) => e.mission_id,
            DomainEvent::ObjectiveCompleted(e) => e.mission_id,
            DomainEvent::MetricValueRecorded(e) => e.mission_id,
        }
    }
}

/// Data for the MissionCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionCreated {
    pub mission_id: AggregateId,
    pub owner_id: UserId,
}

/// Data for the MissionRenamed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionRenamed {
    pub mission_id: AggregateId,
}

/// Data for the CollaboratorAdded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorAdded {
    pub mission_id: AggregateId,
    pub collaborator_id: UserId,
    pub added_by: UserId,
}

/// Data for the CollaboratorRemoved event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorRemoved {
    pub mission_id: AggregateId,
    pub collaborator_id: UserId,
}

/// Data for the ObjectiveAdded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveAdded {
    pub mission_id: AggregateId,
    pub objective_id: Uuid,
}

/// Data for the ObjectiveCompleted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveCompleted {
    pub mission_id: AggregateId,
    pub objective_id: Uuid,
}

/// Data for the MetricValueRecorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricValueRecorded {
    pub mission_id: AggregateId,
    pub metric_id: Uuid,
}
