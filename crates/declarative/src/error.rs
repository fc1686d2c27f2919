//! Error types for plan validation and runs.

use thiserror::Error;

/// Invalid resource or notification wiring, detected before a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Two resources share an id
    #[error("duplicate resource id: {0}")]
    DuplicateResource(String),

    /// A notification names a resource that was never declared
    #[error("notification {role} '{id}' is not a declared resource")]
    UnknownResource {
        /// "source" or "target"
        role: &'static str,
        /// The missing id
        id: String,
    },

    /// A notification asks a resource for an action it does not have
    #[error("resource '{id}' does not support action '{action}'")]
    UnsupportedAction {
        /// Target resource id
        id: String,
        /// Requested action
        action: String,
    },

    /// The notification graph is not acyclic
    #[error("notification cycle involving resource '{id}'")]
    Cycle {
        /// A resource on the cycle
        id: String,
    },
}

/// Errors that stop a convergence run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The plan failed validation; nothing was executed
    #[error("invalid plan: {0}")]
    Plan(#[from] PlanError),

    /// A required resource failed; earlier changes are left in place
    #[error("resource '{id}' failed ({action}): {reason}")]
    ResourceFailed {
        /// Resource id
        id: String,
        /// Action that failed
        action: String,
        /// Error message from the action
        reason: String,
    },

    /// Nested immediate notifications went deeper than allowed
    #[error("notification depth limit {depth} exceeded at resource '{id}'")]
    RecursionLimit {
        /// Resource about to be executed
        id: String,
        /// The configured limit
        depth: usize,
    },
}

impl RunError {
    /// Id of the resource the error is about
    pub fn resource_id(&self) -> &str {
        match self {
            Self::Plan(PlanError::DuplicateResource(id))
            | Self::Plan(PlanError::UnknownResource { id, .. })
            | Self::Plan(PlanError::UnsupportedAction { id, .. })
            | Self::Plan(PlanError::Cycle { id })
            | Self::ResourceFailed { id, .. }
            | Self::RecursionLimit { id, .. } => id,
        }
    }
}
