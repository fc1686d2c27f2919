//! Apply context and provider traits
//!
//! These traits allow the declarative crate to be used without
//! depending on a real filesystem or a specific progress UI.

use crate::types::{Outcome, RunSummary, Timing};
use std::path::Path;
use std::time::SystemTime;

/// Existence and freshness checks used by resource guards
///
/// Guards never touch the filesystem directly; they ask a probe. Hosts use
/// [`FsProbe`], tests substitute an in-memory implementation.
pub trait Probe {
    /// Whether a file or directory exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Last modification time of `path`, if it exists
    fn modified(&self, path: &Path) -> Option<SystemTime>;

    /// Whether `path` exists and is a directory
    fn is_dir(&self, path: &Path) -> bool {
        self.exists(path)
    }

    /// Contents of a text file, if readable
    fn read_to_string(&self, _path: &Path) -> Option<String> {
        None
    }

    /// Permission bits of `path`, if known
    fn mode(&self, _path: &Path) -> Option<u32> {
        None
    }
}

/// Probe backed by the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl Probe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_to_string(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }

    #[cfg(unix)]
    fn mode(&self, path: &Path) -> Option<u32> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .ok()
            .map(|m| m.permissions().mode() & 0o7777)
    }
}

/// Progress callback for convergence runs
///
/// Implement this trait to receive progress updates during a run.
pub trait ProgressCallback {
    /// Called once before the walk starts
    fn on_run_start(&mut self, walk_len: usize);

    /// Called when starting to evaluate a resource
    fn on_resource_start(&mut self, id: &str, description: &str);

    /// Called when a resource action completes
    fn on_resource_complete(&mut self, id: &str, action: &str, outcome: &Outcome);

    /// Called when a notification fires
    fn on_notification(&mut self, source: &str, target: &str, action: &str, timing: Timing);

    /// Called after the delayed flush
    fn on_run_complete(&mut self, summary: &RunSummary);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _walk_len: usize) {}
    fn on_resource_start(&mut self, _id: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _id: &str, _action: &str, _outcome: &Outcome) {}
    fn on_notification(&mut self, _source: &str, _target: &str, _action: &str, _timing: Timing) {}
    fn on_run_complete(&mut self, _summary: &RunSummary) {}
}

/// Context passed to resource apply operations
pub struct ApplyContext<'a> {
    /// Whether to output verbose information
    pub verbose: bool,
    /// Guard inputs, also available to actions
    pub probe: &'a dyn Probe,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(verbose: bool, probe: &'a dyn Probe) -> Self {
        Self { verbose, probe }
    }
}
