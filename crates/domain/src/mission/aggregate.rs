use std::collections::BTreeMap;

use common::{AggregateId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, EventBuffer, EventSource};
use crate::event::{
    CollaboratorAdded, CollaboratorRemoved, DomainEvent, MetricValueRecorded, MissionCreated,
    MissionRenamed, ObjectiveAdded, ObjectiveCompleted,
};

use super::MissionError;

/// A measurable goal inside a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
}

/// A mission shared between an owner and its collaborators.
///
/// Every successful mutation raises exactly one event; rejected mutations
/// leave both state and the event buffer untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    id: AggregateId,
    name: String,
    owner_id: UserId,
    collaborators: Vec<UserId>,
    objectives: Vec<Objective>,
    metric_values: BTreeMap<Uuid, f64>,
    #[serde(skip)]
    events: EventBuffer,
}

impl Mission {
    /// Creates a new mission owned by `owner_id`.
    pub fn create(name: impl Into<String>, owner_id: UserId) -> Result<Self, MissionError> {
        let name = Self::validate_name(name.into())?;
        let id = AggregateId::new();

        let mut mission = Self {
            id,
            name,
            owner_id,
            collaborators: Vec::new(),
            objectives: Vec::new(),
            metric_values: BTreeMap::new(),
            events: EventBuffer::new(),
        };
        mission.raise(DomainEvent::MissionCreated(MissionCreated {
            mission_id: id,
            owner_id,
        }));
        Ok(mission)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    pub fn collaborators(&self) -> &[UserId] {
        &self.collaborators
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn metric_value(&self, metric_id: Uuid) -> Option<f64> {
        self.metric_values.get(&metric_id).copied()
    }

    /// Renames the mission. Renaming to the current name is a no-op.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), MissionError> {
        let name = Self::validate_name(name.into())?;
        if name == self.name {
            return Ok(());
        }
        self.name = name;
        self.raise(DomainEvent::MissionRenamed(MissionRenamed {
            mission_id: self.id,
        }));
        Ok(())
    }

    pub fn add_collaborator(
        &mut self,
        collaborator_id: UserId,
        added_by: UserId,
    ) -> Result<(), MissionError> {
        if collaborator_id == self.owner_id {
            return Err(MissionError::OwnerCannotCollaborate(collaborator_id));
        }
        if self.collaborators.contains(&collaborator_id) {
            return Err(MissionError::AlreadyCollaborator(collaborator_id));
        }

        self.collaborators.push(collaborator_id);
        self.raise(DomainEvent::CollaboratorAdded(CollaboratorAdded {
            mission_id: self.id,
            collaborator_id,
            added_by,
        }));
        Ok(())
    }

    pub fn remove_collaborator(&mut self, collaborator_id: UserId) -> Result<(), MissionError> {
        let pos = self
            .collaborators
            .iter()
            .position(|c| *c == collaborator_id)
            .ok_or(MissionError::NotACollaborator(collaborator_id))?;

        self.collaborators.remove(pos);
        self.raise(DomainEvent::CollaboratorRemoved(CollaboratorRemoved {
            mission_id: self.id,
            collaborator_id,
        }));
        Ok(())
    }

    /// Adds an objective and returns its id.
    pub fn add_objective(&mut self, title: impl Into<String>) -> Result<Uuid, MissionError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(MissionError::ObjectiveTitleRequired);
        }

        let objective_id = Uuid::new_v4();
        self.objectives.push(Objective {
            id: objective_id,
            title,
            completed: false,
        });
        self.raise(DomainEvent::ObjectiveAdded(ObjectiveAdded {
            mission_id: self.id,
            objective_id,
        }));
        Ok(objective_id)
    }

    pub fn complete_objective(&mut self, objective_id: Uuid) -> Result<(), MissionError> {
        let objective = self
            .objectives
            .iter_mut()
            .find(|o| o.id == objective_id)
            .ok_or(MissionError::ObjectiveNotFound(objective_id))?;
        if objective.completed {
            return Err(MissionError::ObjectiveAlreadyCompleted(objective_id));
        }

        objective.completed = true;
        self.raise(DomainEvent::ObjectiveCompleted(ObjectiveCompleted {
            mission_id: self.id,
            objective_id,
        }));
        Ok(())
    }

    pub fn record_metric_value(&mut self, metric_id: Uuid, value: f64) -> Result<(), MissionError> {
        if !value.is_finite() {
            return Err(MissionError::InvalidMetricValue(value));
        }

        self.metric_values.insert(metric_id, value);
        self.raise(DomainEvent::MetricValueRecorded(MetricValueRecorded {
            mission_id: self.id,
            metric_id,
        }));
        Ok(())
    }

    fn validate_name(name: String) -> Result<String, MissionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MissionError::NameRequired);
        }
        Ok(name.to_string())
    }

    fn raise(&mut self, event: DomainEvent) {
        self.events.record(event);
    }
}

impl EventSource for Mission {
    fn pending_events(&self) -> &[DomainEvent] {
        self.events.as_slice()
    }

    fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl Aggregate for Mission {
    fn aggregate_type() -> &'static str {
        "Mission"
    }

    fn id(&self) -> AggregateId {
        self.id
    }
}
