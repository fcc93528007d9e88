//! Ordered schema migrations for the contacts store.
//!
//! # Invariants
//! - Versions are strictly increasing, starting at 1.
//! - All pending steps run in one transaction; `PRAGMA user_version`
//!   follows each step so a failure leaves the previous version intact.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "contacts_tables",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "versioning",
        sql: include_str!("0002_versioning.sql"),
    },
];

/// Schema version this build migrates up to.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the store schema up to `latest_version()`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the store was written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = stored_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }
    if from == latest {
        debug!("event=db_migrate module=db status=ok from={from} to={latest} applied=0");
        return Ok(());
    }

    let tx = conn.transaction()?;
    let pending = MIGRATIONS.iter().filter(|migration| migration.version > from);
    let mut applied = 0_u32;
    for migration in pending {
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        debug!(
            "event=db_migration module=db status=ok version={} name={}",
            migration.version, migration.name
        );
        applied += 1;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from={from} to={latest} applied={applied}");
    Ok(())
}

fn stored_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}
