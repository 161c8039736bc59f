//! Lead repository
//!
//! Leads are read-only from the dispatcher's point of view.

use sqlx::PgPool;
use zapline_common::types::ClientId;

use crate::models::Lead;

/// Lead repository
#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    /// Create a new lead repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List a client's sendable leads (not opted out), oldest first
    pub async fn list_sendable_by_client(
        &self,
        client_id: ClientId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Lead>, sqlx::Error> {
        sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE client_id = $1 AND opted_out = FALSE
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(client_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Count a client's sendable leads
    pub async fn count_sendable_by_client(&self, client_id: ClientId) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM leads WHERE client_id = $1 AND opted_out = FALSE",
        )
        .bind(client_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}
