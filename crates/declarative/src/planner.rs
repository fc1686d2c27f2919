//! Run planner - the ordered resource list and its notification wiring

use crate::error::PlanError;
use crate::notify::{Notification, NotificationRegistry};
use crate::resource::{BoxedResource, Resource, ResourceExt};
use crate::types::{Activation, Criticality};
use std::collections::HashMap;

/// A resource together with how the run treats it
#[derive(Debug)]
pub struct Declared {
    pub resource: BoxedResource,
    pub criticality: Criticality,
    pub activation: Activation,
}

/// An ordered set of resources plus the notifications between them
///
/// Resources are walked in the order they were added. Validation runs before
/// any resource executes, so wiring mistakes never leave a half-applied host.
#[derive(Debug, Default)]
pub struct RunPlan {
    resources: Vec<Declared>,
    index: HashMap<String, usize>,
    notifications: NotificationRegistry,
}

impl RunPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required resource evaluated during the walk
    pub fn add(&mut self, resource: BoxedResource) {
        self.add_with(resource, Criticality::Required, Activation::Walk);
    }

    /// Add a walked resource whose failure only produces a warning
    pub fn add_best_effort(&mut self, resource: BoxedResource) {
        self.add_with(resource, Criticality::BestEffort, Activation::Walk);
    }

    /// Add a resource that only runs when notified
    pub fn add_on_notify(&mut self, resource: BoxedResource) {
        self.add_with(resource, Criticality::Required, Activation::OnNotify);
    }

    /// Add a resource with explicit criticality and activation
    pub fn add_with(
        &mut self,
        resource: BoxedResource,
        criticality: Criticality,
        activation: Activation,
    ) {
        // First declaration wins the index; duplicates are reported by `validate`
        self.index
            .entry(resource.id())
            .or_insert(self.resources.len());
        self.resources.push(Declared {
            resource,
            criticality,
            activation,
        });
    }

    /// Declare a notification
    pub fn notify(&mut self, notification: Notification) {
        self.notifications.register(notification);
    }

    /// Look up a declared resource by id
    pub fn get(&self, id: &str) -> Option<&Declared> {
        self.index.get(id).map(|&i| &self.resources[i])
    }

    /// Iterate resources in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Declared> {
        self.resources.iter()
    }

    /// Resources evaluated during the walk, in order
    pub fn walk(&self) -> impl Iterator<Item = &Declared> {
        self.resources
            .iter()
            .filter(|d| d.activation == Activation::Walk)
    }

    /// The notification registry
    pub fn notifications(&self) -> &NotificationRegistry {
        &self.notifications
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.resources.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Validate ids, notification endpoints, target actions and acyclicity
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.index.len() != self.resources.len() {
            let mut seen = std::collections::HashSet::new();
            for declared in &self.resources {
                let id = declared.resource.id();
                if !seen.insert(id.clone()) {
                    return Err(PlanError::DuplicateResource(id));
                }
            }
        }

        for notification in self.notifications.iter() {
            if self.get(&notification.source).is_none() {
                return Err(PlanError::UnknownResource {
                    role: "source",
                    id: notification.source.clone(),
                });
            }

            let target = self
                .get(&notification.target)
                .ok_or_else(|| PlanError::UnknownResource {
                    role: "target",
                    id: notification.target.clone(),
                })?;

            if !target.resource.supports_action(&notification.action) {
                return Err(PlanError::UnsupportedAction {
                    id: notification.target.clone(),
                    action: notification.action.clone(),
                });
            }
        }

        self.notifications.check_acyclic()
    }
}

/// Check whether a resource matches a `type` or `type.name` filter
pub fn matches_target(resource: &dyn Resource, target: &str) -> bool {
    let (resource_type, name) = match target.split_once('.') {
        Some((t, n)) => (t, Some(n)),
        None => (target, None),
    };

    if resource.resource_type() != resource_type {
        return false;
    }

    if let Some(n) = name
        && !resource.id().contains(n)
    {
        return false;
    }

    true
}
