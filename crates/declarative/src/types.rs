//! Core types for convergence runs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of executing a resource action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The guard reported the resource as satisfied, or the action made no change
    Unchanged,
    /// The action changed the system
    Changed,
    /// The action failed
    Failed { reason: String },
}

impl Outcome {
    /// Check if the outcome represents a change
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed)
    }

    /// Check if the outcome represents a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short symbol for progress output
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Unchanged => "○",
            Self::Changed => "✓",
            Self::Failed { .. } => "✗",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Changed => write!(f, "changed"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// How a failure of a resource affects the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criticality {
    /// A failure halts the run
    #[default]
    Required,
    /// A failure is logged and dispatched as `Unchanged`
    BestEffort,
}

/// When a resource is evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Evaluated in declaration order during the walk
    #[default]
    Walk,
    /// Only runs when a notification targets it
    OnNotify,
}

/// When a notified action runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timing {
    /// Inline, before the triggering step completes
    Immediate,
    /// Once, after every resource of the walk has been evaluated
    Delayed,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediately"),
            Self::Delayed => write!(f, "delayed"),
        }
    }
}

/// Which outcomes of the source resource fire a notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeFilter {
    /// Only when the source reported `Changed`
    #[default]
    OnChange,
    /// On any outcome that did not fail
    Always,
}

impl OutcomeFilter {
    /// Check whether the filter accepts an outcome
    pub fn accepts(&self, outcome: &Outcome) -> bool {
        match self {
            Self::OnChange => outcome.is_changed(),
            Self::Always => !outcome.is_failed(),
        }
    }
}

/// What caused a resource action to execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// The ordered walk
    Walk,
    /// An immediate notification from the named resource
    Immediate { source: String },
    /// The end-of-run flush of delayed notifications
    Delayed,
}

/// One executed step of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub resource_id: String,
    pub action: String,
    pub outcome: Outcome,
    pub trigger: Trigger,
}

/// Summary of a convergence run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub changed: usize,
    pub unchanged: usize,
    /// Best-effort failures downgraded to warnings
    pub degraded: usize,
    /// Notified actions that executed
    pub notified: usize,
    /// Every executed step, in execution order
    pub records: Vec<ExecutionRecord>,
}

impl RunSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.changed
    }

    /// Check whether the run left the system untouched
    pub fn is_converged(&self) -> bool {
        self.changed == 0
    }

    /// Total number of executed steps
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Ids of the resources that changed, in execution order
    pub fn changed_ids(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.outcome.is_changed())
            .map(|r| r.resource_id.as_str())
            .collect()
    }

    /// Number of times a resource executed (any trigger)
    pub fn executions_of(&self, resource_id: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.resource_id == resource_id)
            .count()
    }

    /// Add a record to the summary
    pub fn add_record(&mut self, record: ExecutionRecord) {
        match &record.outcome {
            Outcome::Changed => self.changed += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Failed { .. } => self.degraded += 1,
        }
        if record.trigger != Trigger::Walk {
            self.notified += 1;
        }
        self.records.push(record);
    }
}

/// Options for a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Verbose output
    pub verbose: bool,
    /// Depth limit for nested immediate notifications
    pub max_notify_depth: usize,
}

/// Default depth limit for nested immediate notifications
pub const MAX_NOTIFY_DEPTH: usize = 32;

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            max_notify_depth: MAX_NOTIFY_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts() {
        let failed = Outcome::Failed {
            reason: "boom".into(),
        };
        assert!(OutcomeFilter::OnChange.accepts(&Outcome::Changed));
        assert!(!OutcomeFilter::OnChange.accepts(&Outcome::Unchanged));
        assert!(OutcomeFilter::Always.accepts(&Outcome::Unchanged));
        assert!(!OutcomeFilter::Always.accepts(&failed));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.add_record(ExecutionRecord {
            resource_id: "a".into(),
            action: "apply".into(),
            outcome: Outcome::Changed,
            trigger: Trigger::Walk,
        });
        summary.add_record(ExecutionRecord {
            resource_id: "b".into(),
            action: "run".into(),
            outcome: Outcome::Unchanged,
            trigger: Trigger::Immediate { source: "a".into() },
        });

        assert_eq!(summary.total(), 2);
        assert_eq!(summary.total_changes(), 1);
        assert_eq!(summary.notified, 1);
        assert_eq!(summary.changed_ids(), vec!["a"]);
        assert!(!summary.is_converged());
    }
}
