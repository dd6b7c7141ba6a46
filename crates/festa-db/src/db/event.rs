//! Event repository.
//!
//! Read-mostly: counter mutations on events are owned by the media
//! repository so they always share a transaction with the media write.

use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use festa_core::models::{EventRecord, EventStats};
use festa_core::AppError;

const EVENT_COLUMNS: &str =
    "id, name, requires_approval, photos, videos, total_size_bytes, pending_approval, created_at, updated_at";

#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(
        &self,
        name: &str,
        requires_approval: bool,
    ) -> Result<EventRecord, AppError> {
        let event = sqlx::query_as::<Postgres, EventRecord>(&format!(
            r#"
            INSERT INTO events (id, name, requires_approval)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(requires_approval)
        .fetch_one(&self.pool)
        .await?;
        Ok(event)
    }

    pub async fn get(&self, event_id: Uuid) -> Result<EventRecord, AppError> {
        sqlx::query_as::<Postgres, EventRecord>(&format!(
            "SELECT {} FROM events WHERE id = $1",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event {}", event_id)))
    }

    pub async fn get_stats(&self, event_id: Uuid) -> Result<EventStats, AppError> {
        Ok(self.get(event_id).await?.stats)
    }
}
