//! Schema versions of the local database.
//!
//! `schema.sql` is idempotent and always applied; each entry here marks a
//! schema revision recorded in `schema_migrations`.

/// A recorded schema revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
}

/// Every schema revision, oldest first
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "local records, offline queue, sync metadata",
}];

/// Latest schema version known to this build
pub fn current_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Revisions newer than `applied`
pub fn pending(applied: i64) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > applied)
}
