//! Database resources - the application's database and its user

use anyhow::Result;
use declarative::{ApplyContext, Outcome, Probe, Resource};
use std::rc::Rc;

use crate::system::Database;

pub struct MysqlDatabase {
    pub name: String,
    db: Rc<dyn Database>,
}

impl MysqlDatabase {
    pub fn new(name: &str, db: &Rc<dyn Database>) -> Self {
        Self {
            name: name.to_string(),
            db: Rc::clone(db),
        }
    }
}

impl std::fmt::Debug for MysqlDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlDatabase")
            .field("name", &self.name)
            .finish()
    }
}

impl Resource for MysqlDatabase {
    fn id(&self) -> String {
        format!("mysql_database:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Database {}", self.name)
    }

    fn resource_type(&self) -> &'static str {
        "mysql_database"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["create"]
    }

    // An unreachable server counts as unsatisfied; the action reports why
    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        self.db.database_exists(&self.name).unwrap_or(false)
    }

    fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
        self.db.create_database(&self.name)?;
        Ok(Outcome::Changed)
    }
}

/// All privileges on one database for `user@host`
pub struct MysqlGrant {
    pub database: String,
    pub user: String,
    pub host: String,
    password: String,
    db: Rc<dyn Database>,
}

impl MysqlGrant {
    pub fn new(database: &str, user: &str, password: &str, db: &Rc<dyn Database>) -> Self {
        Self {
            database: database.to_string(),
            user: user.to_string(),
            host: "localhost".to_string(),
            password: password.to_string(),
            db: Rc::clone(db),
        }
    }
}

impl std::fmt::Debug for MysqlGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlGrant")
            .field("database", &self.database)
            .field("user", &self.user)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl Resource for MysqlGrant {
    fn id(&self) -> String {
        format!("mysql_database_user:{}", self.user)
    }

    fn description(&self) -> String {
        format!(
            "Grant {}@{} all privileges on {}",
            self.user, self.host, self.database
        )
    }

    fn resource_type(&self) -> &'static str {
        "mysql_database_user"
    }

    fn actions(&self) -> &'static [&'static str] {
        &["grant"]
    }

    fn is_satisfied(&self, _probe: &dyn Probe) -> bool {
        self.db
            .has_all_privileges(&self.database, &self.user, &self.host)
            .unwrap_or(false)
    }

    fn apply(&self, _action: &str, _ctx: &mut ApplyContext) -> Result<Outcome> {
        self.db
            .grant_all(&self.database, &self.user, &self.host, &self.password)?;
        Ok(Outcome::Changed)
    }
}
