//! Activation history.
//!
//! A row is written each time a version claims control. On restart the
//! latest row tells the worker which partitions it last served from.

use super::connection::CacheDb;
use super::naming::PartitionNames;
use crate::Error;
use tokio_rusqlite::{params, rusqlite};

impl CacheDb {
    /// Record that `names`' version claimed control.
    pub async fn record_activation(&self, names: &PartitionNames) -> Result<(), Error> {
        let prefix = names.prefix().to_string();
        let version = names.version().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO activations (prefix, version, activated_at) VALUES (?1, ?2, ?3)",
                    params![prefix, version, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Version of the most recent activation under `prefix`, if any.
    pub async fn last_activated_version(&self, prefix: &str) -> Result<Option<String>, Error> {
        let prefix = prefix.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT version FROM activations WHERE prefix = ?1 ORDER BY id DESC LIMIT 1",
                    params![prefix],
                    |row| row.get::<_, String>(0),
                );

                match result {
                    Ok(version) => Ok(Some(version)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}
