//! Notification registry and dispatcher
//!
//! Notifications are declared before a run. After each resource executes the
//! driver hands its outcome to the [`Dispatcher`], which returns the
//! immediate follow-ups to run inline and queues delayed ones, deduplicated
//! by target, for the end of the run.

use crate::error::PlanError;
use crate::types::{Outcome, OutcomeFilter, Timing};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A declared causal link between two resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Resource whose outcome is observed
    pub source: String,
    /// Which outcomes fire the notification
    pub filter: OutcomeFilter,
    /// Resource to run
    pub target: String,
    /// Action to run on the target
    pub action: String,
    /// When the target runs
    pub timing: Timing,
}

impl Notification {
    /// Create a notification that fires when `source` changes
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        action: impl Into<String>,
        timing: Timing,
    ) -> Self {
        Self {
            source: source.into(),
            filter: OutcomeFilter::OnChange,
            target: target.into(),
            action: action.into(),
            timing,
        }
    }

    /// Run `target` inline when `source` changes
    pub fn immediately(
        source: impl Into<String>,
        target: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::new(source, target, action, Timing::Immediate)
    }

    /// Run `target` once at the end of the run when `source` changes
    pub fn delayed(
        source: impl Into<String>,
        target: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::new(source, target, action, Timing::Delayed)
    }

    /// Replace the outcome filter
    pub fn when(mut self, filter: OutcomeFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Notifications declared for a run, in declaration order
#[derive(Debug, Clone, Default)]
pub struct NotificationRegistry {
    entries: Vec<Notification>,
}

impl NotificationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notification, returning its declaration index
    pub fn register(&mut self, notification: Notification) -> usize {
        self.entries.push(notification);
        self.entries.len() - 1
    }

    /// Number of registered notifications
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no notifications are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate notifications in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    /// Notifications from `source` whose filter accepts `outcome`
    pub fn matching<'a>(
        &'a self,
        source: &'a str,
        outcome: &'a Outcome,
    ) -> impl Iterator<Item = (usize, &'a Notification)> + 'a {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.source == source && n.filter.accepts(outcome))
    }

    /// Validate that the notification graph is a DAG
    pub fn check_acyclic(&self) -> Result<(), PlanError> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for notification in &self.entries {
            let source = *nodes
                .entry(notification.source.as_str())
                .or_insert_with(|| graph.add_node(notification.source.as_str()));
            let target = *nodes
                .entry(notification.target.as_str())
                .or_insert_with(|| graph.add_node(notification.target.as_str()));
            graph.add_edge(source, target, ());
        }

        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(PlanError::Cycle {
                id: graph[cycle.node_id()].to_string(),
            }),
        }
    }
}

/// A notification that fired and whose target must run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    /// Declaration index of the notification
    pub index: usize,
    pub source: String,
    pub target: String,
    pub action: String,
    pub timing: Timing,
}

/// Run-time notification state
///
/// Tracks which declared notifications already fired (each fires at most
/// once per run) and the delayed queue keyed by target.
#[derive(Debug, Default)]
pub struct Dispatcher {
    fired: HashSet<usize>,
    delayed: Vec<Firing>,
    flushed: HashSet<String>,
}

impl Dispatcher {
    /// Create a dispatcher for a fresh run
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe an outcome of `source`
    ///
    /// Returns the immediate firings, in declaration order, that the caller
    /// must execute before continuing. Delayed firings are queued.
    pub fn notify(
        &mut self,
        registry: &NotificationRegistry,
        source: &str,
        outcome: &Outcome,
    ) -> Vec<Firing> {
        let mut immediate = Vec::new();

        for (index, notification) in registry.matching(source, outcome) {
            if !self.fired.insert(index) {
                log::debug!(
                    "Notification {} -> {} already fired this run",
                    source,
                    notification.target
                );
                continue;
            }

            let firing = Firing {
                index,
                source: source.to_string(),
                target: notification.target.clone(),
                action: notification.action.clone(),
                timing: notification.timing,
            };

            match notification.timing {
                Timing::Immediate => immediate.push(firing),
                Timing::Delayed => self.enqueue(firing),
            }
        }

        immediate
    }

    /// Queue a delayed firing, overwriting any queued firing for the same target
    fn enqueue(&mut self, firing: Firing) {
        if self.flushed.contains(&firing.target) {
            log::debug!(
                "Delayed target {} already ran this run, ignoring request from {}",
                firing.target,
                firing.source
            );
            return;
        }

        if let Some(queued) = self.delayed.iter_mut().find(|q| q.target == firing.target) {
            log::debug!(
                "Delayed target {} requested again by {}",
                firing.target,
                firing.source
            );
            queued.index = queued.index.min(firing.index);
            queued.source = firing.source;
            queued.action = firing.action;
        } else {
            self.delayed.push(firing);
        }
    }

    /// Take the next delayed firing, ordered by declaration index
    ///
    /// A target handed out here is never handed out again in the same run.
    pub fn next_delayed(&mut self) -> Option<Firing> {
        let pos = self
            .delayed
            .iter()
            .enumerate()
            .min_by_key(|(_, f)| f.index)
            .map(|(pos, _)| pos)?;

        let firing = self.delayed.remove(pos);
        self.flushed.insert(firing.target.clone());
        Some(firing)
    }

    /// Number of queued delayed firings
    pub fn pending_delayed(&self) -> usize {
        self.delayed.len()
    }
}
