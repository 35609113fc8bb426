//! Durable mutation queue on SQLite.
//!
//! A row is inserted when a write could not reach the network and deleted
//! only after a confirmed replay. Insertion order is kept via `seq`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use http::Method;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use url::Url;

use super::connection::EdgeDb;
use crate::Error;
use crate::exchange::EdgeRequest;
use crate::store::MutationQueue;

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A write request captured for later replay.
///
/// Serializes to the persistence record shape
/// `{ id, url, method, headers: [[name, value], ...], body: string|null, timestamp }`
/// with `timestamp` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QueuedMutation {
    pub id: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    #[serde(with = "body_text")]
    #[schemars(with = "Option<String>")]
    pub body: Option<Bytes>,
    pub timestamp: i64,
}

impl QueuedMutation {
    /// Snapshot a request that failed to reach the network.
    pub fn from_request(request: &EdgeRequest) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        Self {
            id: generate_id(timestamp),
            url: request.url.to_string(),
            method: request.method.as_str().to_string(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            timestamp,
        }
    }

    /// Rebuild the original request for replay.
    pub fn to_request(&self) -> Result<EdgeRequest, Error> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|e| Error::Queue(format!("mutation {}: invalid method {}: {e}", self.id, self.method)))?;
        let url = Url::parse(&self.url).map_err(|e| Error::InvalidUrl(format!("mutation {}: {e}", self.id)))?;

        let mut request = EdgeRequest::new(method, url);
        request.headers = self.headers.clone();
        request.body = self.body.clone();
        Ok(request)
    }
}

/// Unique id of the form `<epoch-ms>-<9 base36 chars>`.
pub fn generate_id(timestamp_ms: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{timestamp_ms}-{suffix}")
}

/// Bodies travel as text in the persistence record; bytes in memory.
mod body_text {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match body {
            Some(bytes) => serializer.serialize_some(&String::from_utf8_lossy(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map(Bytes::from))
    }
}

#[async_trait]
impl MutationQueue for EdgeDb {
    async fn enqueue(&self, mutation: &QueuedMutation) -> Result<(), Error> {
        let headers_json = serde_json::to_string(&mutation.headers)?;
        let mutation = mutation.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO mutation_queue (id, url, method, headers_json, body, timestamp)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        &mutation.id,
                        &mutation.url,
                        &mutation.method,
                        &headers_json,
                        mutation.body.as_deref(),
                        mutation.timestamp,
                    ],
                )
                .map_err(|e| Error::Queue(format!("enqueue {}: {e}", mutation.id)))?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn list_all(&self) -> Result<Vec<QueuedMutation>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<QueuedMutation>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, url, method, headers_json, body, timestamp
                    FROM mutation_queue ORDER BY seq ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Option<Vec<u8>>>(4)?,
                            row.get::<_, i64>(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(id, url, method, headers_json, body, timestamp)| -> Result<QueuedMutation, Error> {
                        Ok(QueuedMutation {
                            headers: serde_json::from_str(&headers_json)?,
                            body: body.map(Bytes::from),
                            id,
                            url,
                            method,
                            timestamp,
                        })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, id: &str) -> Result<bool, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM mutation_queue WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
