//! Entry storage: GET-by-URL request/response pairs inside a partition.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::{Error, Request, Response};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Row shape shared by the single and batch writers.
struct EntryRow {
    key_hash: String,
    url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::CacheWriteFailure(format!(
                "{} {}: only GET requests can be cached",
                request.method, request.url
            )));
        }

        let headers_json =
            serde_json::to_string(&response.headers).map_err(|e| Error::CacheWriteFailure(e.to_string()))?;

        Ok(Self {
            key_hash: compute_entry_key(&request.method, request.url.as_str()),
            url: request.url.to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers_json,
            body: response.body.clone(),
        })
    }
}

fn insert_row(conn: &rusqlite::Connection, partition: &str, row: &EntryRow, now: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
        params![partition, now],
    )?;
    conn.execute(
        "INSERT INTO entries (partition, key_hash, url, status, status_text, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(partition, key_hash) DO UPDATE SET
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            partition,
            &row.key_hash,
            &row.url,
            row.status as i64,
            &row.status_text,
            &row.headers_json,
            &row.body,
            now,
        ],
    )?;
    Ok(())
}

fn read_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u16, String, String, Vec<u8>)> {
    Ok((row.get::<_, i64>(0)? as u16, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_response((status, status_text, headers_json, body): (u16, String, String, Vec<u8>)) -> Response {
    let headers = serde_json::from_str(&headers_json).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stored headers are not valid JSON; dropping them");
        Vec::new()
    });
    Response { status, status_text, headers, body }
}

impl CacheDb {
    /// Store a response under the request's URL, creating the partition lazily.
    ///
    /// Last write wins for the same key.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheWriteFailure` for non-GET requests; storage errors
    /// surface as `Error::Database`. Callers on the request path log and
    /// swallow both.
    pub async fn put(&self, partition: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let row = EntryRow::new(request, response)?;
        let partition = partition.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> { insert_row(conn, &partition, &row, &now) })
            .await
            .map_err(Error::from)
    }

    /// Store a batch atomically: every entry is written, or none is.
    ///
    /// The partition is created inside the same transaction.
    pub async fn put_all(&self, partition: &str, entries: &[(Request, Response)]) -> Result<usize, Error> {
        let rows = entries
            .iter()
            .map(|(req, resp)| EntryRow::new(req, resp))
            .collect::<Result<Vec<_>, _>>()?;
        let partition = partition.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![&partition, &now],
                )?;
                for row in &rows {
                    insert_row(&tx, &partition, row, &now)?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request in one partition.
    ///
    /// Non-GET requests never match.
    pub async fn match_request(&self, partition: &str, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        let key_hash = compute_entry_key(&request.method, request.url.as_str());
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let result = conn.query_row(
                    "SELECT status, status_text, headers_json, body FROM entries
                     WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                    read_response,
                );

                match result {
                    Ok(row) => Ok(Some(into_response(row))),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// First match for the request across every partition, in creation order.
    ///
    /// Returns the partition name alongside the response.
    pub async fn match_any(&self, request: &Request) -> Result<Option<(String, Response)>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        let key_hash = compute_entry_key(&request.method, request.url.as_str());
        self.conn
            .call(move |conn| -> Result<Option<(String, Response)>, Error> {
                let result = conn.query_row(
                    "SELECT e.status, e.status_text, e.headers_json, e.body, e.partition
                     FROM entries e JOIN partitions p ON p.name = e.partition
                     WHERE e.key_hash = ?1
                     ORDER BY p.rowid
                     LIMIT 1",
                    params![key_hash],
                    |row| Ok((read_response(row)?, row.get::<_, String>(4)?)),
                );

                match result {
                    Ok((row, partition)) => Ok(Some((partition, into_response(row)))),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a partition, oldest first.
    pub async fn keys(&self, partition: &str) -> Result<Vec<String>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE partition = ?1 ORDER BY rowid")?;
                let urls = stmt
                    .query_map(params![partition], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn entry_count(&self, partition: &str) -> Result<u64, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
