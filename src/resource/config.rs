//! Apply-config resource - merges desired settings into `config.php`
//!
//! The installer writes `config.php` on its first request, generating its
//! own `passwordsalt`, `secret` and `instanceid`. Every run afterwards merges
//! the desired values over it without touching those generated keys, writes
//! it back atomically, and records the generated identifiers in node state so
//! a rebuilt host reuses them.

use anyhow::{Context, Result};
use declarative::{ApplyContext, Outcome, Probe, Resource};
use phpconf::{Array, ConfigDocument, ConfigStore, MergePolicy, Value};
use std::cell::RefCell;
use std::rc::Rc;

use crate::credentials::{INSTANCE_ID, PASSWORD_SALT};
use crate::state::NodeStore;
use crate::system::Ownership;

/// Generated config keys mirrored into node state, with their state names
const RECORDED: &[(&str, &str)] = &[("passwordsalt", PASSWORD_SALT), ("instanceid", INSTANCE_ID)];

pub struct ApplyConfig {
    store: ConfigStore,
    desired: Array,
    policy: MergePolicy,
    node: Rc<RefCell<dyn NodeStore>>,
    /// Mirror generated keys into node state (off in solo mode)
    record: bool,
    owner: (String, String),
    ownership: Rc<dyn Ownership>,
}

impl ApplyConfig {
    pub fn new(
        store: ConfigStore,
        desired: Array,
        node: &Rc<RefCell<dyn NodeStore>>,
        ownership: &Rc<dyn Ownership>,
    ) -> Self {
        Self {
            store,
            desired,
            policy: MergePolicy::default(),
            node: Rc::clone(node),
            record: true,
            owner: ("root".to_string(), "root".to_string()),
            ownership: Rc::clone(ownership),
        }
    }

    pub fn owned_by(mut self, user: &str, group: &str) -> Self {
        self.owner = (user.to_string(), group.to_string());
        self
    }

    pub fn without_recording(mut self) -> Self {
        self.record = false;
        self
    }

    /// Desired values adjusted against the current document
    pub fn desired_for(&self, doc: &ConfigDocument) -> Array {
        let mut desired = self.desired.clone();

        // The installer may pick the more specific sqlite3 driver
        if desired.get("dbtype").and_then(Value::as_str) == Some("sqlite")
            && doc.get("dbtype").and_then(Value::as_str) == Some("sqlite3")
        {
            desired.insert("dbtype", "sqlite3");
        }

        // Restore recorded identifiers should the document lose them
        let node = self.node.borrow();
        for (key, name) in RECORDED {
            if let Some(value) = node.get(name)
                && desired.get(key).is_none()
            {
                desired.insert(*key, value);
            }
        }
        desired
    }

    /// Generated values in `doc` not yet in node state
    fn unrecorded(&self, doc: &ConfigDocument) -> Vec<(&'static str, String)> {
        if !self.record {
            return Vec::new();
        }
        let node = self.node.borrow();
        RECORDED
            .iter()
            .filter(|(_, name)| node.get(name).is_none())
            .filter_map(|(key, name)| {
                doc.get(key)
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
                    .map(|v| (*name, v.to_string()))
            })
            .collect()
    }

    fn owner_matches(&self) -> bool {
        self.ownership.owner(self.store.path()).as_ref() == Some(&self.owner)
    }
}

impl std::fmt::Debug for ApplyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyConfig")
            .field("path", &self.store.path())
            .field("keys", &self.desired.len())
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl Resource for ApplyConfig {
    fn id(&self) -> String {
        "ruby_block:apply config".to_string()
    }

    fn description(&self) -> String {
        format!("Merge settings into {}", self.store.path().display())
    }

    fn resource_type(&self) -> &'static str {
        "config"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["run"]
    }

    fn is_satisfied(&self, probe: &dyn Probe) -> bool {
        let Some(Ok(doc)) = probe
            .read_to_string(self.store.path())
            .map(|raw| phpconf::parse(&raw))
        else {
            return false;
        };
        let (_, report) = phpconf::merge(&doc, &self.desired_for(&doc), &self.policy);
        report.is_noop() && self.unrecorded(&doc).is_empty() && self.owner_matches()
    }

    fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
        let doc = self.store.load_optional()?.with_context(|| {
            format!(
                "{} does not exist; the web installer has not completed",
                self.store.path().display()
            )
        })?;

        let (merged, report) = phpconf::merge(&doc, &self.desired_for(&doc), &self.policy);
        let mut changed = false;

        if !report.is_noop() {
            self.store.write(&merged)?;
            log::info!(
                "Updated {} ({} keys set, {} added)",
                self.store.path().display(),
                report.set.len(),
                report.added.len()
            );
            changed = true;
        }
        for key in &report.kept_generated {
            log::debug!("Kept generated {key}");
        }

        if !self.owner_matches() {
            let (user, group) = &self.owner;
            self.ownership.chown(self.store.path(), user, group)?;
            changed = true;
        }

        let unrecorded = self.unrecorded(&merged);
        if !unrecorded.is_empty() {
            let mut node = self.node.borrow_mut();
            for (name, value) in &unrecorded {
                node.set_if_absent(name, value);
            }
            node.save()?;
            changed = true;
        }

        Ok(if changed {
            Outcome::Changed
        } else {
            Outcome::Unchanged
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryNodeStore;
    use crate::system::fake::FakeHost;
    use declarative::{FsProbe, execute_resource};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::SystemTime;

    /// Serves one in-memory file, nothing touches the disk
    struct InMemoryFiles {
        path: PathBuf,
        content: String,
    }

    impl Probe for InMemoryFiles {
        fn exists(&self, path: &Path) -> bool {
            path == self.path
        }

        fn modified(&self, _path: &Path) -> Option<SystemTime> {
            None
        }

        fn read_to_string(&self, path: &Path) -> Option<String> {
            self.exists(path).then(|| self.content.clone())
        }
    }

    const INSTALLED: &str = "<?php
$CONFIG = array (
  'passwordsalt' => 'installer-salt',
  'secret' => 'installer-secret',
  'instanceid' => 'oc1234',
  'dbtype' => 'sqlite3',
  'version' => '10.13.4.1',
);
";

    struct Fixture {
        _dir: tempfile::TempDir,
        fakes: FakeHost,
        node: Rc<RefCell<MemoryNodeStore>>,
        path: std::path::PathBuf,
    }

    fn fixture(existing: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.php");
        if let Some(content) = existing {
            fs::write(&path, content).unwrap();
        }
        Fixture {
            fakes: FakeHost::new(dir.path()),
            node: Rc::new(RefCell::new(MemoryNodeStore::new())),
            path,
            _dir: dir,
        }
    }

    fn resource(f: &Fixture, desired: Array) -> ApplyConfig {
        let node: Rc<RefCell<dyn NodeStore>> = f.node.clone();
        ApplyConfig::new(ConfigStore::new(&f.path), desired, &node, &f.fakes.host().ownership)
            .owned_by("www-data", "www-data")
    }

    #[test]
    fn test_merges_and_records_generated_keys() {
        let f = fixture(Some(INSTALLED));
        let mut desired = Array::new();
        desired.insert("dbtype", "sqlite");
        desired.insert("passwordsalt", "requested");
        desired.insert("overwritewebroot", "/owncloud");

        let apply = resource(&f, desired);
        let mut ctx = ApplyContext::new(false, &FsProbe);
        assert_eq!(execute_resource(&apply, "run", &mut ctx), Outcome::Changed);

        let doc = phpconf::parse_file(&f.path).unwrap();
        assert_eq!(doc.get("passwordsalt"), Some(&Value::from("installer-salt")));
        assert_eq!(doc.get("dbtype"), Some(&Value::from("sqlite3")));
        assert_eq!(doc.get("overwritewebroot"), Some(&Value::from("/owncloud")));
        assert_eq!(doc.get("version"), Some(&Value::from("10.13.4.1")));

        let node = f.node.borrow();
        assert_eq!(node.get(PASSWORD_SALT).as_deref(), Some("installer-salt"));
        assert_eq!(node.get(INSTANCE_ID).as_deref(), Some("oc1234"));
        assert_eq!(node.saves, 1);
        drop(node);

        assert!(apply.is_satisfied(&FsProbe));
        assert_eq!(execute_resource(&apply, "run", &mut ctx), Outcome::Unchanged);
    }

    #[test]
    fn test_missing_config_fails() {
        let f = fixture(None);
        let apply = resource(&f, Array::new());
        let mut ctx = ApplyContext::new(false, &FsProbe);

        assert!(!apply.is_satisfied(&FsProbe));
        assert!(execute_resource(&apply, "run", &mut ctx).is_failed());
        assert!(!f.path.exists());
    }

    #[test]
    fn test_parse_error_leaves_file_untouched() {
        let broken = "<?php\n$CONFIG = array (\n  'dbtype' => ,\n);\n";
        let f = fixture(Some(broken));
        let mut desired = Array::new();
        desired.insert("dbtype", "mysql");

        let apply = resource(&f, desired);
        let mut ctx = ApplyContext::new(false, &FsProbe);
        assert!(execute_resource(&apply, "run", &mut ctx).is_failed());
        assert_eq!(fs::read_to_string(&f.path).unwrap(), broken);
    }

    #[test]
    fn test_solo_mode_records_nothing() {
        let f = fixture(Some(INSTALLED));
        let apply = resource(&f, Array::new()).without_recording();
        let mut ctx = ApplyContext::new(false, &FsProbe);

        execute_resource(&apply, "run", &mut ctx);
        assert!(f.node.borrow().get(PASSWORD_SALT).is_none());
        assert_eq!(f.node.borrow().saves, 0);
        assert!(apply.is_satisfied(&FsProbe));
    }

    #[test]
    fn test_recorded_identifiers_restored() {
        let f = fixture(Some("<?php\n$CONFIG = array (\n  'dbtype' => 'mysql',\n);\n"));
        f.node.borrow_mut().set_if_absent(INSTANCE_ID, "oc-original");

        let apply = resource(&f, Array::new());
        let mut ctx = ApplyContext::new(false, &FsProbe);
        execute_resource(&apply, "run", &mut ctx);

        let doc = phpconf::parse_file(&f.path).unwrap();
        assert_eq!(doc.get("instanceid"), Some(&Value::from("oc-original")));
    }

    #[test]
    fn test_guard_reads_injected_file_view() {
        let f = fixture(Some("<?php\n$CONFIG = array (\n  'dbtype' => 'mysql',\n);\n"));
        f.fakes.ownership.chown(&f.path, "www-data", "www-data").unwrap();
        f.node.borrow_mut().set_if_absent(PASSWORD_SALT, "installer-salt");
        f.node.borrow_mut().set_if_absent(INSTANCE_ID, "oc1234");
        let mut desired = Array::new();
        desired.insert("dbtype", "sqlite");

        let apply = resource(&f, desired);
        let files = InMemoryFiles {
            path: f.path.clone(),
            content: INSTALLED.to_string(),
        };

        assert!(apply.is_satisfied(&files));
        assert!(!apply.is_satisfied(&FsProbe));
        assert!(!apply.is_satisfied(&InMemoryFiles {
            path: f.path.clone(),
            content: "<?php $CONFIG = array (".to_string(),
        }));
    }
}
