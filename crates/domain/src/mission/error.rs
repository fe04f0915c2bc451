use common::UserId;
use thiserror::Error;
use uuid::Uuid;

/// Business rule violations on a mission.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MissionError {
    #[error("Mission name is required")]
    NameRequired,

    #[error("Objective title is required")]
    ObjectiveTitleRequired,

    #[error("User {0} is the mission owner")]
    OwnerCannotCollaborate(UserId),

    #[error("User {0} is already a collaborator")]
    AlreadyCollaborator(UserId),

    #[error("User {0} is not a collaborator")]
    NotACollaborator(UserId),

    #[error("Objective not found: {0}")]
    ObjectiveNotFound(Uuid),

    #[error("Objective already completed: {0}")]
    ObjectiveAlreadyCompleted(Uuid),

    #[error("Metric value must be finite, got {0}")]
    InvalidMetricValue(f64),
}
