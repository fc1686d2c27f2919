//! Credential manager
//!
//! Resolves the secrets a deployment needs. An operator-supplied value
//! always wins; otherwise a value already recorded in node state is reused,
//! and only a brand-new host gets a freshly generated one.

use crate::state::NodeStore;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Length of generated secrets
pub const SECRET_LENGTH: usize = 20;

/// Node state key of the database password
pub const DB_PASSWORD: &str = "owncloud.config.dbpassword";
/// Node state key of the admin password
pub const ADMIN_PASSWORD: &str = "owncloud.admin.pass";
/// Node state key of the installer-generated password salt
pub const PASSWORD_SALT: &str = "owncloud.config.passwordsalt";
/// Node state key of the installer-generated instance id
pub const INSTANCE_ID: &str = "owncloud.config.instanceid";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("missing required credential: {0}")]
    Missing(String),

    #[error("failed to record credential {name}: {reason}")]
    Store { name: String, reason: String },
}

/// What to do when no value is supplied or recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    GenerateIfMissing,
    RequireSupplied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Generated,
    UserSupplied,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generated => write!(f, "generated"),
            Self::UserSupplied => write!(f, "supplied"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub value: String,
    pub origin: Origin,
}

// Never print the secret itself
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("origin", &self.origin)
            .finish()
    }
}

pub struct CredentialManager {
    store: Rc<RefCell<dyn NodeStore>>,
    supplied: Vec<(String, String)>,
}

impl CredentialManager {
    pub fn new(store: Rc<RefCell<dyn NodeStore>>) -> Self {
        Self {
            store,
            supplied: Vec::new(),
        }
    }

    /// Register an operator-supplied value; empty values count as absent
    pub fn supply(mut self, name: &str, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.supplied.retain(|(n, _)| n != name);
            self.supplied.push((name.to_string(), value));
        }
        self
    }

    fn supplied(&self, name: &str) -> Option<&str> {
        self.supplied
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Resolve a credential, generating and recording it if policy allows
    pub fn ensure(&self, name: &str, policy: Policy) -> Result<Credential, CredentialError> {
        if let Some(credential) = self.peek(name) {
            return Ok(credential);
        }

        if policy == Policy::RequireSupplied {
            return Err(CredentialError::Missing(name.to_string()));
        }

        let generated = generate_secret();
        let mut store = self.store.borrow_mut();
        store.set_if_absent(name, &generated);
        store.save().map_err(|e| CredentialError::Store {
            name: name.to_string(),
            reason: format!("{e:#}"),
        })?;
        log::info!("Generated credential {name}");

        // Another writer may have won the race; the stored value is authoritative
        let value = store.get(name).unwrap_or(generated);
        Ok(Credential {
            name: name.to_string(),
            value,
            origin: Origin::Generated,
        })
    }

    /// Resolve without generating anything
    pub fn peek(&self, name: &str) -> Option<Credential> {
        if let Some(value) = self.supplied(name) {
            return Some(Credential {
                name: name.to_string(),
                value: value.to_string(),
                origin: Origin::UserSupplied,
            });
        }

        self.store.borrow().get(name).map(|value| Credential {
            name: name.to_string(),
            value,
            origin: Origin::Generated,
        })
    }
}

/// A fresh alphanumeric secret from the OS random source
pub fn generate_secret() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryNodeStore;

    fn manager(store: MemoryNodeStore) -> (CredentialManager, Rc<RefCell<MemoryNodeStore>>) {
        let store = Rc::new(RefCell::new(store));
        (CredentialManager::new(store.clone()), store)
    }

    #[test]
    fn test_generate_secret_shape() {
        let secret = generate_secret();
        assert_eq!(secret.len(), SECRET_LENGTH);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_generate_once_then_reuse() {
        let (manager, store) = manager(MemoryNodeStore::new());

        let first = manager.ensure(DB_PASSWORD, Policy::GenerateIfMissing).unwrap();
        let second = manager.ensure(DB_PASSWORD, Policy::GenerateIfMissing).unwrap();

        assert_eq!(first.origin, Origin::Generated);
        assert_eq!(first.value, second.value);
        assert_eq!(store.borrow().get(DB_PASSWORD), Some(first.value));
        assert_eq!(store.borrow().saves, 1);
    }

    #[test]
    fn test_supplied_value_wins() {
        let (manager, store) = manager(MemoryNodeStore::new().with(ADMIN_PASSWORD, "stored"));
        let manager = manager.supply(ADMIN_PASSWORD, Some("operator".to_string()));

        let credential = manager.ensure(ADMIN_PASSWORD, Policy::GenerateIfMissing).unwrap();
        assert_eq!(credential.value, "operator");
        assert_eq!(credential.origin, Origin::UserSupplied);
        assert_eq!(store.borrow().saves, 0);
    }

    #[test]
    fn test_require_supplied_fails_without_value() {
        let (manager, store) = manager(MemoryNodeStore::new());

        let err = manager.ensure(DB_PASSWORD, Policy::RequireSupplied).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required credential: owncloud.config.dbpassword"
        );
        assert!(store.borrow().keys().is_empty());
    }

    #[test]
    fn test_empty_supplied_value_is_absent() {
        let (manager, _store) = manager(MemoryNodeStore::new());
        let manager = manager.supply(DB_PASSWORD, Some(String::new()));

        assert!(manager.ensure(DB_PASSWORD, Policy::RequireSupplied).is_err());
    }

    #[test]
    fn test_peek_never_generates() {
        let (manager, store) = manager(MemoryNodeStore::new());
        assert!(manager.peek(ADMIN_PASSWORD).is_none());
        assert!(store.borrow().keys().is_empty());
    }

    #[test]
    fn test_debug_redacts_value() {
        let credential = Credential {
            name: "x".into(),
            value: "topsecret".into(),
            origin: Origin::Generated,
        };
        assert!(!format!("{credential:?}").contains("topsecret"));
    }
}
