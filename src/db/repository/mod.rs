//! Repository layer: entity-scoped database operations.
//!
//! Each sub-module owns the SQL for one table family. All public
//! functions are re-exported here.

mod account;
mod center;
mod followup;
mod history;
mod lab_staff;
mod patient;
mod prescription;
mod staff;
mod stats;
mod test_request;
mod user;

use rusqlite::types::ToSql;
use rusqlite::ParamsFromIter;

pub use account::*;
pub use center::*;
pub use followup::*;
pub use history::*;
pub use lab_staff::*;
pub use patient::*;
pub use prescription::*;
pub use staff::*;
pub use stats::*;
pub use test_request::*;
pub use user::*;

/// Incrementally built `WHERE` clause with anonymous `?` parameters.
#[derive(Default)]
pub(crate) struct WhereClause {
    clauses: Vec<String>,
    values: Vec<Box<dyn ToSql>>,
}

impl WhereClause {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a condition with exactly one `?` placeholder.
    pub(crate) fn push<V: ToSql + 'static>(&mut self, sql: &str, value: V) {
        self.clauses.push(sql.to_string());
        self.values.push(Box::new(value));
    }

    /// Case-insensitive substring match over any of `columns`.
    pub(crate) fn push_search(&mut self, columns: &[&str], term: &str) {
        let pattern = format!("%{}%", term.trim().to_lowercase());
        let ors: Vec<String> = columns
            .iter()
            .map(|c| format!("LOWER(COALESCE({c}, '')) LIKE ?"))
            .collect();
        self.clauses.push(format!("({})", ors.join(" OR ")));
        for _ in columns {
            self.values.push(Box::new(pattern.clone()));
        }
    }

    pub(crate) fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> ParamsFromIter<std::slice::Iter<'_, Box<dyn ToSql>>> {
        rusqlite::params_from_iter(self.values.iter())
    }
}
