//! Entry CRUD operations.
//!
//! Provides functions for writing and replaying captured responses under a
//! given store version. Writes are whole-entry upserts; there is no partial
//! update path.

use super::connection::StoreDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A captured response, keyed by normalized request identity.
///
/// Holds everything needed to replay the response to a later caller:
/// status, the headers relevant to body interpretation, and the body bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoreDb {
    /// Insert or overwrite a captured response under `version`.
    ///
    /// Uses UPSERT semantics on (version, key): concurrent writers to the same
    /// key race and the last write wins, which is acceptable because entries
    /// are idempotent snapshots of a URL's latest fetched content.
    ///
    /// Returns `false` without writing when `version` is not a registered
    /// store version. A late write (say, a background refresh completing
    /// after a newer activation discarded this generation) must not recreate
    /// the deleted version row.
    pub async fn put_entry(&self, version: &str, entry: &StoredEntry) -> Result<bool, Error> {
        let version = version.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM versions WHERE tag = ?1)",
                        params![version],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                if !exists {
                    return Ok(false);
                }
                conn.execute(
                    "INSERT INTO entries (
                        version, key, method, url, status, content_type, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(version, key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        content_type = excluded.content_type,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &version,
                        &entry.key,
                        &entry.method,
                        &entry.url,
                        entry.status,
                        &entry.content_type,
                        &entry.headers_json,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Get a captured response by version and normalized key.
    ///
    /// Returns None if no entry exists under that version.
    pub async fn get_entry(&self, version: &str, key: &str) -> Result<Option<StoredEntry>, Error> {
        let version = version.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status, content_type, headers_json, body, stored_at
                     FROM entries WHERE version = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![version, key], |row| {
                    Ok(StoredEntry {
                        key: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        status: row.get(3)?,
                        content_type: row.get(4)?,
                        headers_json: row.get(5)?,
                        body: row.get(6)?,
                        stored_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(e) => Ok(Some(e)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries held under `version`.
    pub async fn entry_count(&self, version: &str) -> Result<u64, Error> {
        let version = version.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM entries WHERE version = ?1", params![version], |row| {
                        row.get(0)
                    })
                    .map_err(Error::from)?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
