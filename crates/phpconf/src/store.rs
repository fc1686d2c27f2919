//! Atomic persistence of config documents.
//!
//! A write goes to a temp file in the target's directory, is flushed to
//! disk, then renamed over the target. Readers see either the old document
//! or the new one, never a torn write.

use crate::error::{Error, Result};
use crate::parser;
use crate::types::ConfigDocument;
use crate::writer;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

/// Default permission bits of a written document
pub const DEFAULT_MODE: u32 = 0o640;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A config document on disk
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    mode: u32,
}

impl ConfigStore {
    /// Store for the document at `path`, written with mode 0640
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: DEFAULT_MODE,
        }
    }

    /// Set the permission bits applied on write
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and parse the document
    pub fn load(&self) -> Result<ConfigDocument> {
        parser::parse_file(&self.path)
    }

    /// Read the document if it exists
    pub fn load_optional(&self) -> Result<Option<ConfigDocument>> {
        match self.load() {
            Ok(doc) => Ok(Some(doc)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if the file already holds exactly the serialized document
    pub fn is_current(&self, doc: &ConfigDocument) -> bool {
        fs::read_to_string(&self.path).is_ok_and(|raw| raw == writer::write_string(doc))
    }

    /// Write the document atomically
    pub fn write(&self, doc: &ConfigDocument) -> Result<()> {
        self.stage(doc)?.commit()
    }

    /// Write the document to a temp file next to the target without
    /// replacing it yet
    pub fn stage(&self, doc: &ConfigDocument) -> Result<StagedWrite> {
        let content = writer::write_string(doc);
        let temp = self.temp_path()?;

        let staged = StagedWrite {
            temp: temp.clone(),
            target: self.path.clone(),
            committed: false,
        };

        let mut file = create_temp(&temp, self.mode).map_err(|e| Error::io(&temp, e))?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::io(&temp, e))?;

        // Open-time bits are masked by the umask; pin the exact mode
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp, fs::Permissions::from_mode(self.mode))
                .map_err(|e| Error::io(&temp, e))?;
        }

        log::debug!("Staged {} at {}", self.path.display(), temp.display());
        Ok(staged)
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let invalid = || {
            Error::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        };
        let dir = self.path.parent().ok_or_else(invalid)?;
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(invalid)?;

        let nanos = std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        Ok(dir.join(format!(
            ".{file_name}.tmp.{}.{nanos}.{seq}",
            std::process::id()
        )))
    }
}

/// Create a fresh temp file that is never more permissive than `mode`
fn create_temp(path: &Path, mode: u32) -> std::io::Result<fs::File> {
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

/// A document written to a temp file, not yet visible at the target.
///
/// Dropping it without [`StagedWrite::commit`] removes the temp file and
/// leaves the target as it was.
#[derive(Debug)]
pub struct StagedWrite {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedWrite {
    /// Location of the temp file
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Atomically replace the target with the staged document
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp, &self.target).map_err(|e| Error::io(&self.target, e))?;
        self.committed = true;

        if let Some(dir) = self.target.parent()
            && let Ok(handle) = fs::File::open(dir)
        {
            let _ = handle.sync_all();
        }

        log::debug!("Committed {}", self.target.display());
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}
