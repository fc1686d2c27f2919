//! Durable node state
//!
//! Values recorded here (generated passwords, the install's salt and
//! instance id) must survive between runs: once written they are reused
//! forever, so a re-run never rotates a secret the application depends on.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Key/value attributes persisted for this host
pub trait NodeStore {
    /// Look up a recorded value
    fn get(&self, key: &str) -> Option<String>;

    /// Record a value unless the key already has one.
    ///
    /// Returns `true` if the value was recorded.
    fn set_if_absent(&mut self, key: &str, value: &str) -> bool;

    /// Persist recorded values
    fn save(&mut self) -> Result<()>;

    /// Recorded keys in sorted order
    fn keys(&self) -> Vec<String>;
}

// ============================================================================
// On-disk format
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeState {
    /// Recorded attributes, keyed by dotted name
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Last time the state was saved
    pub last_updated: DateTime<Utc>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            attributes: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// Node state persisted as TOML, written atomically with mode 0600
#[derive(Debug)]
pub struct FileNodeStore {
    path: PathBuf,
    state: NodeState,
    dirty: bool,
}

impl FileNodeStore {
    /// Load state from disk, or start empty if the file doesn't exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let state = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read state file: {}", path.display()))?;
            let state: NodeState = toml::from_str(&content)
                .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
            log::debug!("Loaded node state from {}", path.display());
            state
        } else {
            log::debug!("State file does not exist, using empty state");
            NodeState::default()
        };

        Ok(Self {
            path,
            state,
            dirty: false,
        })
    }
}

impl NodeStore for FileNodeStore {
    fn get(&self, key: &str) -> Option<String> {
        self.state.attributes.get(key).cloned()
    }

    fn set_if_absent(&mut self, key: &str, value: &str) -> bool {
        if self.state.attributes.contains_key(key) {
            return false;
        }
        self.state
            .attributes
            .insert(key.to_string(), value.to_string());
        self.dirty = true;
        true
    }

    fn save(&mut self) -> Result<()> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }

        self.state.last_updated = Utc::now();
        let content =
            toml::to_string_pretty(&self.state).context("Failed to serialize state to TOML")?;
        write_atomic(&self.path, content.as_bytes(), 0o600)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        self.dirty = false;
        log::debug!("Saved node state to {}", self.path.display());
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.state.attributes.keys().cloned().collect()
    }
}

/// Create a new file whose permissions never exceed `mode`
fn create_private(path: &Path, mode: u32) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options.open(path)
}

/// Temp file in the same directory, fsync, rename, fsync the directory
fn write_atomic(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    let dir = path.parent().context("State path has no parent directory")?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("State path has no file name")?;
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    // A leftover temp could carry looser bits than a fresh one
    let _ = fs::remove_file(&tmp_path);

    let write_result = (|| -> std::io::Result<()> {
        let mut file = create_private(&tmp_path, mode)?;
        file.write_all(content)?;
        file.sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(mode))?;
        }

        fs::rename(&tmp_path, path)?;

        if let Ok(parent_dir) = fs::File::open(dir) {
            let _ = parent_dir.sync_all();
        }
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}

// ============================================================================
// In-memory store
// ============================================================================

/// Node state that lives only as long as the run, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    values: BTreeMap<String, String>,
    pub saves: usize,
}

#[cfg(test)]
impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
impl NodeStore for MemoryNodeStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_if_absent(&mut self, key: &str, value: &str) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key.to_string(), value.to_string());
        true
    }

    fn save(&mut self) -> Result<()> {
        self.saves += 1;
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_if_absent_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut store = FileNodeStore::load(dir.path().join("node.toml")).unwrap();

        assert!(store.set_if_absent("owncloud.config.passwordsalt", "first"));
        assert!(!store.set_if_absent("owncloud.config.passwordsalt", "second"));
        assert_eq!(
            store.get("owncloud.config.passwordsalt").as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("node.toml");

        let mut store = FileNodeStore::load(&path).unwrap();
        store.set_if_absent("owncloud.admin.pass", "s3cret");
        store.set_if_absent("owncloud.config.dbpassword", "db");
        store.save().unwrap();

        let reloaded = FileNodeStore::load(&path).unwrap();
        assert_eq!(reloaded.get("owncloud.admin.pass").as_deref(), Some("s3cret"));
        assert_eq!(
            reloaded.keys(),
            vec!["owncloud.admin.pass", "owncloud.config.dbpassword"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_state_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.toml");
        let mut store = FileNodeStore::load(&path).unwrap();
        store.set_if_absent("k", "v");
        store.save().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_state_temp_is_private_from_creation() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let file = create_private(&dir.path().join(".node.toml.tmp"), 0o600).unwrap();

        let mode = file.metadata().unwrap().permissions().mode() & 0o777;
        assert_eq!(mode & !0o600, 0, "temp created with {mode:o}");
    }

    #[test]
    fn test_save_replaces_leftover_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.toml");
        let leftover = dir
            .path()
            .join(format!(".node.toml.tmp.{}", std::process::id()));
        fs::write(&leftover, "stale").unwrap();

        let mut store = FileNodeStore::load(&path).unwrap();
        store.set_if_absent("k", "v");
        store.save().unwrap();

        assert!(!leftover.exists());
        assert_eq!(FileNodeStore::load(&path).unwrap().get("k").as_deref(), Some("v"));
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(&path, "attributes = [").unwrap();

        assert!(FileNodeStore::load(&path).is_err());
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryNodeStore::new().with("a", "1");
        assert!(!store.set_if_absent("a", "2"));
        assert!(store.set_if_absent("b", "3"));
        store.save().unwrap();
        assert_eq!(store.saves, 1);
        assert_eq!(store.keys(), vec!["a", "b"]);
    }
}
