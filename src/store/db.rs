//! SQLite persistence collaborator.
//!
//! All durable state lives here: the locus tables, their attribute tables,
//! the `positions` backing store for the spatial index and the LID
//! sequence. The store never touches raw files; it goes through
//! [`LociDb`] for every read and write.

use std::path::Path;

use rusqlite::types::{
    FromSql,
    FromSqlError,
    FromSqlResult,
    ToSql,
    ToSqlOutput,
    ValueRef,
};
use rusqlite::{
    Connection,
    Transaction,
};

use crate::data_structs::AttrValue;
use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS loci (
    LID INTEGER PRIMARY KEY,

    chromosome TEXT NOT NULL,
    start INTEGER NOT NULL,
    "end" INTEGER NOT NULL,

    source TEXT,
    feature_type TEXT,
    strand TEXT NOT NULL,
    frame INTEGER,

    name TEXT
);

CREATE TABLE IF NOT EXISTS subloci (
    LID INTEGER PRIMARY KEY,

    root_LID INTEGER NOT NULL,
    parent_LID INTEGER NOT NULL,

    chromosome TEXT NOT NULL,
    start INTEGER NOT NULL,
    "end" INTEGER NOT NULL,

    source TEXT,
    feature_type TEXT,
    strand TEXT NOT NULL,
    frame INTEGER,

    name TEXT
);

CREATE TABLE IF NOT EXISTS loci_attrs (
    LID INTEGER NOT NULL,
    key TEXT NOT NULL,
    val,
    FOREIGN KEY(LID) REFERENCES loci(LID),
    UNIQUE(LID, key)
);

CREATE TABLE IF NOT EXISTS subloci_attrs (
    LID INTEGER NOT NULL,
    key TEXT NOT NULL,
    val,
    FOREIGN KEY(LID) REFERENCES subloci(LID),
    UNIQUE(LID, key)
);

CREATE TABLE IF NOT EXISTS positions (
    LID INTEGER PRIMARY KEY,
    start INTEGER NOT NULL,
    "end" INTEGER NOT NULL,
    chromosome TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lid_alloc (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    next_lid INTEGER NOT NULL
);
INSERT OR IGNORE INTO lid_alloc (id, next_lid) VALUES (0, 1);

CREATE INDEX IF NOT EXISTS locus_name ON loci (name);
CREATE INDEX IF NOT EXISTS locus_chromosome ON loci (chromosome);
CREATE INDEX IF NOT EXISTS locus_start ON loci (start);
CREATE INDEX IF NOT EXISTS locus_end ON loci ("end");
CREATE INDEX IF NOT EXISTS locus_feature_type ON loci (feature_type);
CREATE INDEX IF NOT EXISTS sublocus_root ON subloci (root_LID);
CREATE INDEX IF NOT EXISTS sublocus_parent ON subloci (parent_LID);
CREATE INDEX IF NOT EXISTS position_range ON positions (chromosome, start, "end");
"#;

const DROP: &str = r#"
DROP TABLE IF EXISTS loci;
DROP TABLE IF EXISTS subloci;
DROP TABLE IF EXISTS loci_attrs;
DROP TABLE IF EXISTS subloci_attrs;
DROP TABLE IF EXISTS positions;
DROP TABLE IF EXISTS lid_alloc;
"#;

/// A dataset connection.
///
/// In multi-threaded applications each thread should open its own
/// connection; a single writer performs inserts while readers run
/// concurrently under SQLite's transactional isolation.
#[derive(Debug)]
pub struct LociDb {
    conn: Connection,
}

impl LociDb {
    /// Opens (creating if needed) a dataset at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens a transient in-memory dataset.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Drops every table and recreates the empty schema.
    pub fn reset(&self) -> Result<()> {
        log::info!("resetting dataset tables");
        self.conn.execute_batch(DROP)?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Starts a scoped bulk transaction. Statements executed through the
    /// returned handle become visible only on commit.
    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

impl ToSql for AttrValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            AttrValue::Num(n) => ToSqlOutput::from(*n),
            AttrValue::Str(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

impl FromSql for AttrValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => Ok(AttrValue::Num(i as f64)),
            ValueRef::Real(f) => Ok(AttrValue::Num(f)),
            ValueRef::Text(t) => {
                Ok(AttrValue::Str(String::from_utf8_lossy(t).into_owned()))
            },
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let db = LociDb::open_in_memory().unwrap();
        db.conn().execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn reset_clears_rows() {
        let db = LociDb::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO loci (LID, chromosome, start, \"end\", strand) \
                 VALUES (1, '1', 10, 20, '+')",
                [],
            )
            .unwrap();
        db.reset().unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM loci", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn attr_value_roundtrip() {
        let db = LociDb::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO loci_attrs (LID, key, val) VALUES (?1, ?2, ?3)",
                rusqlite::params![1, "score", AttrValue::Num(0.5)],
            )
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO loci_attrs (LID, key, val) VALUES (?1, ?2, ?3)",
                rusqlite::params![1, "biotype", AttrValue::from("protein_coding")],
            )
            .unwrap();
        let score: AttrValue = db
            .conn()
            .query_row(
                "SELECT val FROM loci_attrs WHERE LID = 1 AND key = 'score'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(score, AttrValue::Num(0.5));
    }
}
