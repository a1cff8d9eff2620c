use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{BookingDraft, BookingError};

pub fn draft_key(patient_id: Uuid) -> String {
    format!("pending_booking:{}", patient_id)
}

/// Holds one pending booking per patient across the payment redirect.
/// Saving overwrites; entries expire on their own.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save(&self, draft: &BookingDraft, ttl: Duration) -> Result<(), BookingError>;

    async fn load(&self, patient_id: Uuid) -> Result<Option<BookingDraft>, BookingError>;

    async fn clear(&self, patient_id: Uuid) -> Result<(), BookingError>;
}

impl From<redis::RedisError> for BookingError {
    fn from(err: redis::RedisError) -> Self {
        BookingError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(err: serde_json::Error) -> Self {
        BookingError::Storage(format!("draft encoding: {}", err))
    }
}

pub struct RedisDraftStore {
    pool: Pool,
}

impl RedisDraftStore {
    pub async fn connect(redis_url: &str) -> Result<Self, BookingError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BookingError::Storage(format!("Failed to create Redis pool: {}", e)))?;

        let store = Self { pool };
        let mut conn = store.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis draft store initialized successfully");

        Ok(store)
    }

    async fn get_connection(&self) -> Result<Connection, BookingError> {
        self.pool
            .get()
            .await
            .map_err(|e| BookingError::Storage(format!("Failed to get Redis connection: {}", e)))
    }
}

#[async_trait]
impl DraftStore for RedisDraftStore {
    async fn save(&self, draft: &BookingDraft, ttl: Duration) -> Result<(), BookingError> {
        let mut conn = self.get_connection().await?;
        let key = draft_key(draft.patient_id);
        let data = serde_json::to_string(draft)?;

        let _: () = redis::pipe()
            .atomic()
            .cmd("DEL").arg(&key).ignore()
            .cmd("HSET")
            .arg(&key)
            .arg("data").arg(&data)
            .arg("booking_type").arg(draft.payload.booking_type().to_string())
            .arg("created_at").arg(draft.created_at.to_rfc3339())
            .ignore()
            .cmd("EXPIRE").arg(&key).arg(ttl.as_secs().max(1)).ignore()
            .query_async(&mut conn)
            .await?;

        debug!("Saved booking draft {} for {}s", key, ttl.as_secs());
        Ok(())
    }

    async fn load(&self, patient_id: Uuid) -> Result<Option<BookingDraft>, BookingError> {
        let mut conn = self.get_connection().await?;
        let data: Option<String> = conn.hget(draft_key(patient_id), "data").await?;

        data.map(|raw| serde_json::from_str(&raw).map_err(BookingError::from))
            .transpose()
    }

    async fn clear(&self, patient_id: Uuid) -> Result<(), BookingError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.del(draft_key(patient_id)).await?;
        debug!("Cleared booking draft for patient {}", patient_id);
        Ok(())
    }
}

/// Process-local store for tests and for running without Redis.
#[derive(Default)]
pub struct InMemoryDraftStore {
    entries: RwLock<HashMap<String, (Instant, BookingDraft)>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        warn!("Using in-memory booking drafts; they will not survive a restart");
        Self::default()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn save(&self, draft: &BookingDraft, ttl: Duration) -> Result<(), BookingError> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(draft_key(draft.patient_id), (expires_at, draft.clone()));
        Ok(())
    }

    async fn load(&self, patient_id: Uuid) -> Result<Option<BookingDraft>, BookingError> {
        let key = draft_key(patient_id);
        let mut entries = self.entries.write().await;

        match entries.get(&key) {
            Some((expires_at, _)) if *expires_at <= Instant::now() => {
                entries.remove(&key);
                Ok(None)
            }
            Some((_, draft)) => Ok(Some(draft.clone())),
            None => Ok(None),
        }
    }

    async fn clear(&self, patient_id: Uuid) -> Result<(), BookingError> {
        self.entries.write().await.remove(&draft_key(patient_id));
        Ok(())
    }
}
