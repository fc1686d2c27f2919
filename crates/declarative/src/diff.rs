//! Pending-change preview for plans
//!
//! Evaluates only guards, never actions, so it is safe to run against a live
//! host to see what the next run would touch.

use crate::context::Probe;
use crate::planner::RunPlan;
use crate::types::{Activation, Criticality};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Guard state of one declared resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Whether the guard reports the resource as satisfied
    pub satisfied: bool,
    pub activation: Activation,
    pub criticality: Criticality,
}

impl ResourceDiff {
    /// Check if the next run would execute this resource during the walk
    pub fn is_pending(&self) -> bool {
        self.activation == Activation::Walk && !self.satisfied
    }
}

/// Evaluate the guard of every resource in the plan
pub fn compute_diffs(plan: &RunPlan, probe: &dyn Probe) -> Vec<ResourceDiff> {
    plan.iter()
        .map(|declared| ResourceDiff {
            resource_id: declared.resource.id(),
            resource_type: declared.resource.resource_type().to_string(),
            description: declared.resource.description(),
            satisfied: declared.resource.is_satisfied(probe),
            activation: declared.activation,
            criticality: declared.criticality,
        })
        .collect()
}

/// Group diffs by resource type, preserving declaration order within groups
pub fn group_by_type(diffs: &[ResourceDiff]) -> BTreeMap<&str, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<&str, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups.entry(diff.resource_type.as_str()).or_default().push(diff);
    }
    groups
}

/// Summary of a set of diffs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Walked resources whose guard is not satisfied
    pub pending: usize,
    /// Walked resources already converged
    pub satisfied: usize,
    /// Resources that only run when notified
    pub on_notify: usize,
}

impl DiffSummary {
    /// Compute summary from diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match (diff.activation, diff.satisfied) {
                (Activation::OnNotify, _) => summary.on_notify += 1,
                (Activation::Walk, true) => summary.satisfied += 1,
                (Activation::Walk, false) => summary.pending += 1,
            }
        }
        summary
    }

    /// Check if the next run has nothing to do during the walk
    pub fn is_converged(&self) -> bool {
        self.pending == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::resource::Resource;
    use crate::types::Outcome;
    use anyhow::Result;
    use std::path::{Path, PathBuf};
    use std::time::SystemTime;

    struct SetProbe(Vec<PathBuf>);

    impl Probe for SetProbe {
        fn exists(&self, path: &Path) -> bool {
            self.0.iter().any(|p| p == path)
        }

        fn modified(&self, _path: &Path) -> Option<SystemTime> {
            None
        }
    }

    #[derive(Debug)]
    struct PathResource(&'static str, &'static str);

    impl Resource for PathResource {
        fn id(&self) -> String {
            self.0.to_string()
        }

        fn description(&self) -> String {
            format!("Create {}", self.0)
        }

        fn resource_type(&self) -> &'static str {
            self.1
        }

        fn is_satisfied(&self, probe: &dyn Probe) -> bool {
            probe.exists(Path::new(self.0))
        }

        fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
            panic!("previews must not apply");
        }
    }

    #[test]
    fn test_compute_diffs_only_evaluates_guards() {
        let mut plan = RunPlan::new();
        plan.add(Box::new(PathResource("/var/www", "directory")));
        plan.add(Box::new(PathResource("/var/www/owncloud/config", "directory")));
        plan.add_on_notify(Box::new(PathResource("/tmp/extract", "execute")));

        let probe = SetProbe(vec![PathBuf::from("/var/www")]);
        let diffs = compute_diffs(&plan, &probe);

        assert_eq!(diffs.len(), 3);
        assert!(!diffs[0].is_pending());
        assert!(diffs[1].is_pending());
        assert!(!diffs[2].is_pending());

        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.satisfied, 1);
        assert_eq!(summary.on_notify, 1);
        assert!(!summary.is_converged());

        let groups = group_by_type(&diffs);
        assert_eq!(groups["directory"].len(), 2);
        assert_eq!(groups["execute"].len(), 1);
    }
}
