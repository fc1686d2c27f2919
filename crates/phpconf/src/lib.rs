//! # phpconf
//!
//! Read, merge and atomically rewrite PHP array-literal configuration files
//! such as ownCloud's `config/config.php`.
//!
//! This crate provides functionality for:
//! - Parsing `$CONFIG = array (...);` documents into an ordered value tree
//! - Serializing documents in PHP's `var_export` layout
//! - Merging desired values without clobbering generated secrets
//! - Writing documents atomically with controlled permissions
//!
//! ## Example
//!
//! ```no_run
//! use phpconf::{merge, Array, ConfigStore, MergePolicy};
//!
//! let store = ConfigStore::new("/var/www/owncloud/config/config.php");
//! let doc = store.load().expect("Failed to load");
//!
//! let mut desired = Array::new();
//! desired.insert("dbtype", "mysql");
//!
//! let (merged, report) = merge(&doc, &desired, &MergePolicy::default());
//! if !report.is_noop() {
//!     store.write(&merged).expect("Failed to write");
//! }
//! ```

pub mod error;
pub mod merge;
pub mod parser;
pub mod store;
pub mod types;
pub mod writer;

pub use error::{Error, Result};
pub use merge::{GENERATED_KEYS, MergePolicy, MergeReport, merge, pending_value};
pub use parser::{parse, parse_file};
pub use store::{ConfigStore, DEFAULT_MODE, StagedWrite};
pub use types::{Array, ConfigDocument, DEFAULT_VARIABLE, Key, Value};
pub use writer::{format_float, write_string as serialize};
