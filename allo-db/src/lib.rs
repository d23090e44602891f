//! In-memory SQLite source store for consent allocation and usage data.
//!
//! This crate loads CSV tables into an in-memory SQLite database and answers
//! generic [`SourceQuery`](allo_core::source::SourceQuery) reads through the
//! [`SourceStore`](allo_core::source::SourceStore) trait.
//!
//! # Architecture
//!
//! - `Rc<RefCell<Connection>>` wrapper; one database value is one connection
//! - In-memory SQLite via `rusqlite`
//! - Headed CSV fixtures (plain or gzipped) loaded per table
//! - Reads validated against the live schema and built with bound parameters
//!
//! # Usage
//!
//! ```rust
//! use allo_core::source::{SourceQuery, SourceStore};
//! use allo_db::Database;
//!
//! let db = Database::new().unwrap();
//! db.load_table("sites", "ext_site_id,catchment\nBS28/5006,Selwyn\n").unwrap();
//!
//! let rows = db.read(&SourceQuery::table("sites")).unwrap();
//! assert_eq!(rows.len(), 1);
//! ```
//!
//! # Tables
//!
//! See [`schema::create_schema`] for the full SQL schema.

pub mod schema;
mod loader;
mod queries;

use rusqlite::Connection;
use std::cell::RefCell;
use std::rc::Rc;

/// In-memory SQLite database holding the source tables.
///
/// This struct is cheaply cloneable (via `Rc`); clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Rc<RefCell<Connection>>,
}

impl Database {
    /// Create a new in-memory database with the full schema applied.
    ///
    /// The database is empty after creation; use the `load_*` methods
    /// to populate it with CSV data.
    pub fn new() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::create_schema())?;
        Ok(Self {
            conn: Rc::new(RefCell::new(conn)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allo_core::source::{SourceQuery, SourceStore};

    #[test]
    fn database_creates_successfully() {
        let db = Database::new();
        assert!(db.is_ok(), "Database should create without errors");
    }

    #[test]
    fn database_is_cloneable() {
        let db = Database::new().unwrap();
        let db2 = db.clone();
        // Both should reference the same underlying connection
        db.load_table("sites", "ext_site_id\nBS28/5006\n").unwrap();
        let sites = db2.read(&SourceQuery::table("sites")).unwrap();
        assert_eq!(sites.len(), 1, "Clone should see same data via shared Rc");
    }

    #[test]
    fn database_starts_empty() {
        let db = Database::new().unwrap();
        let consents = db.read(&SourceQuery::table("crc_allo")).unwrap();
        assert!(consents.is_empty(), "New database should have no consents");
    }
}
