//! Partition lifecycle: open, delete, enumerate and evict.

use std::collections::HashSet;

use super::connection::CacheDb;
use super::naming::PartitionNames;
use crate::{Error, Request, Response};
use tokio_rusqlite::params;

/// Handle to an open partition.
///
/// Borrowed from the database; entry operations delegate to [`CacheDb`].
#[derive(Debug, Clone)]
pub struct PartitionHandle<'a> {
    db: &'a CacheDb,
    name: String,
}

impl PartitionHandle<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        self.db.put(&self.name, request, response).await
    }

    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        self.db.match_request(&self.name, request).await
    }

    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.db.keys(&self.name).await
    }
}

impl CacheDb {
    /// Open a partition, creating it if absent. Idempotent.
    pub async fn open_partition(&self, name: &str) -> Result<PartitionHandle<'_>, Error> {
        let owned = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![owned, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(PartitionHandle { db: self, name: name.to_string() })
    }

    /// Delete a partition and all of its entries.
    ///
    /// Returns whether the partition existed.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Every partition in the store, in creation order.
    pub async fn list_partitions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Partitions owned by the application, including previous versions.
    pub async fn list_owned(&self, names: &PartitionNames) -> Result<Vec<String>, Error> {
        let all = self.list_partitions().await?;
        Ok(all.into_iter().filter(|n| names.is_owned(n)).collect())
    }

    /// Delete every owned partition not listed in `current`.
    ///
    /// Returns the deleted names. Partitions outside the prefix are never touched.
    pub async fn evict_stale(&self, names: &PartitionNames, current: &HashSet<String>) -> Result<Vec<String>, Error> {
        let mut evicted = Vec::new();
        for name in self.list_owned(names).await? {
            if current.contains(&name) {
                continue;
            }
            let version = names.parse(&name).map(|p| p.version);
            if self.delete_partition(&name).await? {
                tracing::info!(partition = %name, version = ?version, "evicted stale partition");
                evicted.push(name);
            }
        }
        Ok(evicted)
    }

    /// Delete every owned partition, current ones included.
    pub async fn clear_owned(&self, names: &PartitionNames) -> Result<Vec<String>, Error> {
        let mut cleared = Vec::new();
        for name in self.list_owned(names).await? {
            if self.delete_partition(&name).await? {
                cleared.push(name);
            }
        }
        tracing::info!(count = cleared.len(), "cleared owned partitions");
        Ok(cleared)
    }
}
