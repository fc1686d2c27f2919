//! # Declarative
//!
//! A convergence engine for single-host provisioning runs.
//!
//! This crate provides the core abstractions for declaring guarded resources,
//! wiring notifications between them, and walking them once in order so a
//! host converges to its desired state without redoing completed work.
//!
//! ## Core Concepts
//!
//! - **Resource**: a guard (already satisfied?) plus named actions
//! - **Outcome**: `Unchanged`, `Changed` or `Failed`
//! - **Notification**: "when X changes, run action A on Y", immediately or delayed
//! - **RunPlan**: the ordered resources and notifications, validated before a run
//! - **converge**: the sequential driver that walks the plan and dispatches notifications
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{converge_simple, FsProbe, Notification, RunPlan};
//!
//! let mut plan = RunPlan::new();
//! plan.add(Box::new(head_check));
//! plan.add_on_notify(Box::new(download));
//! plan.add_on_notify(Box::new(extract));
//! plan.notify(Notification::immediately("http_request:HEAD owncloud", "remote_file:download owncloud", "create"));
//! plan.notify(Notification::immediately("remote_file:download owncloud", "execute:extract owncloud", "run"));
//!
//! let summary = converge_simple(&plan, &FsProbe)?;
//! println!("{} changes", summary.total_changes());
//! ```
//!
//! ## Provider Traits
//!
//! - [`Probe`]: existence and freshness checks used by guards
//! - [`ProgressCallback`]: receives progress updates
//!
//! Both are injected so runs can be exercised without a real filesystem or UI.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod notify;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, FsProbe, NoProgress, Probe, ProgressCallback};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use error::{PlanError, RunError};
pub use executor::{converge, converge_simple, execute_resource};
pub use notify::{Dispatcher, Firing, Notification, NotificationRegistry};
pub use planner::{Declared, RunPlan, matches_target};
pub use resource::{BoxedResource, DEFAULT_ACTION, Resource, ResourceExt};
pub use types::{
    Activation, Criticality, ExecutionRecord, MAX_NOTIFY_DEPTH, Outcome, OutcomeFilter,
    RunOptions, RunSummary, Timing, Trigger,
};
