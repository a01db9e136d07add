//! Store generation bookkeeping.
//!
//! Each store version is one generation of cached content. The lifecycle
//! manager registers the new generation at install time and deletes
//! superseded generations during activation; entry rows cascade away with
//! their version.

use super::connection::StoreDb;
use crate::Error;
use tokio_rusqlite::params;

impl StoreDb {
    /// Register a store version. Idempotent.
    pub async fn register_version(&self, tag: &str) -> Result<(), Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO versions (tag, created_at) VALUES (?1, ?2)",
                    params![tag, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether `tag` is a known store version.
    pub async fn has_version(&self, tag: &str) -> Result<bool, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM versions WHERE tag = ?1)",
                        params![tag],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// List all known store versions, oldest first.
    pub async fn list_versions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT tag FROM versions ORDER BY created_at, tag")?;
                let tags = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store version and, via cascade, every entry it holds.
    ///
    /// Returns the number of entries that were destroyed with it.
    pub async fn delete_version(&self, tag: &str) -> Result<u64, Error> {
        let tag = tag.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM entries WHERE version = ?1", params![tag], |row| {
                        row.get(0)
                    })
                    .map_err(Error::from)?;
                conn.execute("DELETE FROM versions WHERE tag = ?1", params![tag])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
