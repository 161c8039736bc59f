//! Campaign repository

use sqlx::PgPool;
use uuid::Uuid;
use zapline_common::types::{CampaignId, ClientId};

use crate::models::{Campaign, CampaignStatus};

/// Input for campaign creation
#[derive(Debug, Clone)]
pub struct CreateCampaign {
    pub client_id: ClientId,
    pub name: String,
    pub content_type: String,
    pub caption_text: Option<String>,
    pub media_path: Option<String>,
    pub instance_id: Option<Uuid>,
    pub start_at: chrono::DateTime<chrono::Utc>,
    pub daily_volume: i32,
    pub target_count: Option<i32>,
}

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new campaign in `draft` status
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, client_id, name, content_type, caption_text, media_path,
                instance_id, start_at, daily_volume, target_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.client_id)
        .bind(&input.name)
        .bind(&input.content_type)
        .bind(&input.caption_text)
        .bind(&input.media_path)
        .bind(input.instance_id)
        .bind(input.start_at)
        .bind(input.daily_volume)
        .bind(input.target_count)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Update campaign status
    pub async fn update_status(
        &self,
        id: CampaignId,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await
    }

    /// Set the total target count after planning
    pub async fn set_target_count(&self, id: CampaignId, count: i32) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE campaigns SET target_count = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List campaigns currently sending
    pub async fn list_active(&self) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE status = 'active'")
            .fetch_all(&self.pool)
            .await
    }
}
