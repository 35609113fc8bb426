//! Cache container records on SQLite.
//!
//! Each container is a row in `containers`; its records live in `records`
//! keyed by `(container, key_hash)` and are removed by cascade when the
//! container is dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::EdgeDb;
use super::signature::RequestSignature;
use crate::Error;
use crate::exchange::ResponseSnapshot;
use crate::store::CacheStore;

/// A stored response for one request signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub key: RequestSignature,
    pub value: ResponseSnapshot,
    pub stored_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(key: RequestSignature, value: ResponseSnapshot) -> Self {
        Self { key, value, stored_at: Utc::now() }
    }

    /// Whether the record is younger than `max_age_seconds`.
    ///
    /// Advisory only; records are never expired because of it.
    pub fn is_fresh(&self, max_age_seconds: u64) -> bool {
        let age = Utc::now().signed_duration_since(self.stored_at);
        age.num_seconds() < i64::try_from(max_age_seconds).unwrap_or(i64::MAX)
    }
}

struct RecordRow {
    method: String,
    url: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl RecordRow {
    fn into_record(self) -> Result<CacheRecord, Error> {
        let status = u16::try_from(self.status)
            .map_err(|_| Error::CorruptRecord(format!("status out of range: {}", self.status)))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        let stored_at = DateTime::parse_from_rfc3339(&self.stored_at)
            .map_err(|e| Error::CorruptRecord(format!("stored_at: {e}")))?
            .with_timezone(&Utc);

        Ok(CacheRecord {
            key: RequestSignature::from_parts(self.method, self.url),
            value: ResponseSnapshot { status, headers, body: self.body.into() },
            stored_at,
        })
    }
}

#[async_trait]
impl CacheStore for EdgeDb {
    async fn open(&self, container: &str) -> Result<(), Error> {
        let container = container.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO containers (name, created_at) VALUES (?1, ?2)",
                    params![container, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, container: &str, key: &RequestSignature) -> Result<Option<CacheRecord>, Error> {
        let container = container.to_string();
        let key_hash = key.cache_key();
        self.conn
            .call(move |conn| -> Result<Option<CacheRecord>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, headers_json, body, stored_at
                    FROM records WHERE container = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![container, key_hash], |row| {
                    Ok(RecordRow {
                        method: row.get(0)?,
                        url: row.get(1)?,
                        status: row.get(2)?,
                        headers_json: row.get(3)?,
                        body: row.get(4)?,
                        stored_at: row.get(5)?,
                    })
                });

                match result {
                    Ok(row) => row.into_record().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// UPSERT in a single transaction together with the container row, so a
    /// record never exists without its container.
    async fn put(&self, container: &str, record: &CacheRecord) -> Result<(), Error> {
        let container = container.to_string();
        let key_hash = record.key.cache_key();
        let method = record.key.method().to_string();
        let url = record.key.url().to_string();
        let status = i64::from(record.value.status);
        let headers_json = serde_json::to_string(&record.value.headers)?;
        let body = record.value.body.to_vec();
        let stored_at = record.stored_at.to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO containers (name, created_at) VALUES (?1, ?2)",
                    params![&container, &stored_at],
                )?;
                tx.execute(
                    "INSERT INTO records (container, key_hash, method, url, status, headers_json, body, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(container, key_hash) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![&container, &key_hash, &method, &url, status, &headers_json, &body, &stored_at],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, container: &str, key: &RequestSignature) -> Result<bool, Error> {
        let container = container.to_string();
        let key_hash = key.cache_key();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM records WHERE container = ?1 AND key_hash = ?2",
                    params![container, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn container_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM containers ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_container(&self, container: &str) -> Result<bool, Error> {
        let container = container.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM containers WHERE name = ?1", params![container])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use url::Url;

    fn make_record(url: &str, body: &str) -> CacheRecord {
        let key = RequestSignature::new(&Method::GET, &Url::parse(url).unwrap());
        let value = ResponseSnapshot::new(200, body.to_string()).with_header("content-type", "application/json");
        CacheRecord::new(key, value)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = EdgeDb::open_in_memory().await.unwrap();
        let record = make_record("https://app.example.com/api/v2/packages", r#"{"packages":[]}"#);

        db.put("api-v1", &record).await.unwrap();

        let retrieved = db.get("api-v1", &record.key).await.unwrap().unwrap();
        assert_eq!(retrieved.key, record.key);
        assert_eq!(retrieved.value, record.value);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = EdgeDb::open_in_memory().await.unwrap();
        let record = make_record("https://app.example.com/api/v2/packages", "{}");
        assert!(db.get("api-v1", &record.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_containers_are_isolated() {
        let db = EdgeDb::open_in_memory().await.unwrap();
        let record = make_record("https://app.example.com/index.html", "<html></html>");

        db.put("static-v1", &record).await.unwrap();

        assert!(db.get("pages-v1", &record.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = EdgeDb::open_in_memory().await.unwrap();
        db.put("api-v1", &make_record("https://app.example.com/api/v2/bookings", "old"))
            .await
            .unwrap();
        let newer = make_record("https://app.example.com/api/v2/bookings", "new");
        db.put("api-v1", &newer).await.unwrap();

        let retrieved = db.get("api-v1", &newer.key).await.unwrap().unwrap();
        assert_eq!(retrieved.value.body_text(), "new");
    }

    #[tokio::test]
    async fn test_delete_record() {
        let db = EdgeDb::open_in_memory().await.unwrap();
        let record = make_record("https://app.example.com/api/v2/instructors", "[]");
        db.put("api-v1", &record).await.unwrap();

        assert!(db.delete("api-v1", &record.key).await.unwrap());
        assert!(!db.delete("api-v1", &record.key).await.unwrap());
        assert!(db.get("api-v1", &record.key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_container_cascades() {
        let db = EdgeDb::open_in_memory().await.unwrap();
        let record = make_record("https://app.example.com/", "<html></html>");
        db.put("static-v1", &record).await.unwrap();
        db.open("pages-v1").await.unwrap();

        assert_eq!(db.container_names().await.unwrap(), vec!["pages-v1", "static-v1"]);

        assert!(db.delete_container("static-v1").await.unwrap());
        assert!(!db.delete_container("static-v1").await.unwrap());
        assert_eq!(db.container_names().await.unwrap(), vec!["pages-v1"]);

        db.open("static-v1").await.unwrap();
        assert!(db.get("static-v1", &record.key).await.unwrap().is_none());
    }

    #[test]
    fn test_is_fresh_with_unbounded_max_age() {
        let record = make_record("https://app.example.com/", "<html></html>");
        assert!(record.is_fresh(u64::MAX));
        assert!(record.is_fresh(60));
        assert!(!record.is_fresh(0));
    }
}
