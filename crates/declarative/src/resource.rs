//! Resource trait for guarded convergence
//!
//! A Resource pairs a side-effect-free guard ("is this already done?")
//! with a side-effecting action that brings the system to the desired state.

use crate::context::{ApplyContext, Probe};
use crate::types::Outcome;
use anyhow::Result;
use std::fmt;

/// Name of the action every resource supports unless it overrides [`Resource::actions`]
pub const DEFAULT_ACTION: &str = "apply";

/// Core trait for guarded resources
///
/// Every resource in a run implements this trait, which provides:
/// - Identity (id, description, type)
/// - A guard (`is_satisfied`) that must not mutate anything
/// - One or more named actions (`apply`)
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, Outcome, Probe, Resource};
///
/// #[derive(Debug)]
/// struct Marker {
///     path: std::path::PathBuf,
/// }
///
/// impl Resource for Marker {
///     fn id(&self) -> String {
///         format!("marker:{}", self.path.display())
///     }
///
///     fn description(&self) -> String {
///         format!("Create marker {}", self.path.display())
///     }
///
///     fn resource_type(&self) -> &'static str {
///         "file"
///     }
///
///     fn is_satisfied(&self, probe: &dyn Probe) -> bool {
///         probe.exists(&self.path)
///     }
///
///     fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> anyhow::Result<Outcome> {
///         std::fs::write(&self.path, "")?;
///         Ok(Outcome::Changed)
///     }
/// }
/// ```
pub trait Resource: fmt::Debug {
    /// Unique identifier for this resource within a plan
    ///
    /// Notifications refer to resources by this id. Examples:
    /// - "package:php5-gd"
    /// - "remote_file:download owncloud"
    /// - "service:apache2"
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category, used for grouping output
    fn resource_type(&self) -> &'static str;

    /// Action names this resource understands
    ///
    /// The first entry is the action run during the walk.
    fn actions(&self) -> &'static [&'static str] {
        &[DEFAULT_ACTION]
    }

    /// Guard: whether the desired state already holds
    ///
    /// Must be free of side effects. Returning `true` skips the action.
    fn is_satisfied(&self, probe: &dyn Probe) -> bool;

    /// Run the named action
    ///
    /// Return `Outcome::Changed` when the system was modified and
    /// `Outcome::Unchanged` when the action found nothing to do. Errors are
    /// mapped to `Outcome::Failed` by the executor.
    fn apply(&self, action: &str, ctx: &mut ApplyContext) -> Result<Outcome>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;

/// Extension trait for working with resources
pub trait ResourceExt {
    /// The action run during the walk
    fn default_action(&self) -> &'static str;

    /// Whether the resource understands `action`
    fn supports_action(&self, action: &str) -> bool;
}

impl<R: Resource + ?Sized> ResourceExt for R {
    fn default_action(&self) -> &'static str {
        self.actions().first().copied().unwrap_or(DEFAULT_ACTION)
    }

    fn supports_action(&self, action: &str) -> bool {
        self.actions().contains(&action)
    }
}
