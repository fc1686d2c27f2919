//! Database server provisioning through the `mysql` client

use crate::runner;
use anyhow::{Context, Result};

pub trait Database {
    fn database_exists(&self, name: &str) -> Result<bool>;
    fn create_database(&self, name: &str) -> Result<()>;
    fn user_exists(&self, user: &str, host: &str) -> Result<bool>;
    /// Whether `user@host` holds ALL PRIVILEGES on `database`
    fn has_all_privileges(&self, database: &str, user: &str, host: &str) -> Result<bool>;
    /// Create `user@host` if needed and grant it everything on `database`
    fn grant_all(&self, database: &str, user: &str, host: &str, password: &str) -> Result<()>;
}

/// Connects as root to the local server
pub struct MysqlCli {
    root_password: String,
}

impl MysqlCli {
    pub fn new(root_password: &str) -> Self {
        Self {
            root_password: root_password.to_string(),
        }
    }

    // Statements on stdin, password in MYSQL_PWD
    fn query(&self, sql: &str) -> Result<String> {
        let mut env = Vec::new();
        if !self.root_password.is_empty() {
            env.push(("MYSQL_PWD", self.root_password.as_str()));
        }
        let input = format!("{};\n", sql.trim_end().trim_end_matches(';'));
        runner::run_with_input("mysql", &["-uroot", "-N", "-B"], &env, &input)
    }
}

impl Database for MysqlCli {
    fn database_exists(&self, name: &str) -> Result<bool> {
        let out = self
            .query(&format!("SHOW DATABASES LIKE {}", quote_like(name)))
            .context("Failed to list databases")?;
        Ok(out.lines().any(|line| line == name))
    }

    fn create_database(&self, name: &str) -> Result<()> {
        log::info!("Creating database {name}");
        self.query(&format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            quote_ident(name)
        ))
        .with_context(|| format!("Failed to create database {name}"))?;
        Ok(())
    }

    fn user_exists(&self, user: &str, host: &str) -> Result<bool> {
        let out = self
            .query(&format!(
                "SELECT COUNT(*) FROM mysql.user WHERE User = {} AND Host = {}",
                quote_str(user),
                quote_str(host)
            ))
            .context("Failed to look up database users")?;
        Ok(out.trim() != "0")
    }

    fn has_all_privileges(&self, database: &str, user: &str, host: &str) -> Result<bool> {
        if !self.user_exists(user, host)? {
            return Ok(false);
        }
        let grants = self
            .query(&format!(
                "SHOW GRANTS FOR {}@{}",
                quote_str(user),
                quote_str(host)
            ))
            .context("Failed to read grants")?;
        let wanted = format!("ALL PRIVILEGES ON {}.*", quote_ident(database));
        Ok(grants.lines().any(|line| line.contains(&wanted)))
    }

    fn grant_all(&self, database: &str, user: &str, host: &str, password: &str) -> Result<()> {
        log::info!("Granting all privileges on {database} to {user}@{host}");
        let account = format!("{}@{}", quote_str(user), quote_str(host));
        self.query(&format!(
            "CREATE USER IF NOT EXISTS {account} IDENTIFIED BY {pw}; \
             ALTER USER {account} IDENTIFIED BY {pw}; \
             GRANT ALL PRIVILEGES ON {db}.* TO {account}; \
             FLUSH PRIVILEGES;",
            pw = quote_str(password),
            db = quote_ident(database),
        ))
        .with_context(|| format!("Failed to grant privileges to {user}@{host}"))?;
        Ok(())
    }
}

/// Quote a string literal
fn quote_str(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Quote a LIKE pattern, matching `_` and `%` literally
fn quote_like(value: &str) -> String {
    quote_str(&value.replace('_', "\\_").replace('%', "\\%"))
}

/// Quote an identifier
fn quote_ident(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting() {
        assert_eq!(quote_str("it's"), r"'it\'s'");
        assert_eq!(quote_str(r"a\b"), r"'a\\b'");
        assert_eq!(quote_ident("own`cloud"), "`own``cloud`");
        assert_eq!(quote_like("own_cloud"), r"'own\\_cloud'");
    }
}
