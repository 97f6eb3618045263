use std::collections::HashMap;

use gestor_shared::ActionType;
use thiserror::Error;

use super::collaborators::CollaboratorError;

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Unknown id, or an id owned by another organization
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Validation failed")]
    Validation { details: HashMap<String, Vec<String>> },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid {action_type} config: {message}")]
    InvalidActionConfig { action_type: ActionType, message: String },
    #[error("Invalid trigger conditions: {0}")]
    InvalidConditions(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut details = HashMap::new();
        details.insert(field.to_string(), vec![message.into()]);
        Self::Validation { details }
    }
}
