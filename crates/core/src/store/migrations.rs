//! Store schema versioning.
//!
//! The applied schema version lives in SQLite's `user_version` pragma. Each
//! pending batch runs in its own transaction together with the version bump.

use super::Error;
use tokio_rusqlite::Connection;

/// Schema batches in version order.
const SCHEMA: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_stores.sql"))];

/// Latest schema version this build knows.
pub const LATEST: i64 = 1;

/// Bring the schema up to [`LATEST`].
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if current > LATEST {
            return Err(Error::MigrationFailed(format!(
                "database schema version {current} is newer than this build ({LATEST})"
            )));
        }

        for &(version, sql) in SCHEMA.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.pragma_update(None, "user_version", version)?;
            tx.commit()?;
            tracing::debug!(version, "applied store schema");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
