//! Campaign target repository
//!
//! Owns the claim/complete operations. The claim is a single atomic
//! statement: a `FOR UPDATE SKIP LOCKED` selection feeding an `UPDATE`,
//! so two concurrent workers can never claim the same target.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;
use zapline_common::types::{CampaignId, TargetId};

use crate::models::{
    CampaignTarget, ClaimedTarget, CreateCampaignTarget, TargetStatusCounts,
};

/// Campaign target repository
#[derive(Clone)]
pub struct TargetRepository {
    pool: PgPool,
}

impl TargetRepository {
    /// Create a new target repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create targets in a single transaction
    pub async fn create_batch(
        &self,
        targets: Vec<CreateCampaignTarget>,
    ) -> Result<u64, sqlx::Error> {
        let mut count = 0u64;
        let mut tx = self.pool.begin().await?;

        for input in targets {
            let result = sqlx::query(
                r#"
                INSERT INTO campaign_targets (id, campaign_id, lead_id, scheduled_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(input.campaign_id)
            .bind(input.lead_id)
            .bind(input.scheduled_at)
            .execute(&mut *tx)
            .await?;

            count += result.rows_affected();
        }

        tx.commit().await?;
        Ok(count)
    }

    /// Get a target by ID
    pub async fn get(&self, id: TargetId) -> Result<Option<CampaignTarget>, sqlx::Error> {
        sqlx::query_as::<_, CampaignTarget>("SELECT * FROM campaign_targets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List queued targets for a campaign in creation order
    pub async fn list_queued_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignTarget>, sqlx::Error> {
        sqlx::query_as::<_, CampaignTarget>(
            r#"
            SELECT * FROM campaign_targets
            WHERE campaign_id = $1 AND status = 'queued'
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Atomically claim up to `limit` due targets.
    ///
    /// Selects `queued` targets whose `scheduled_at` has passed and whose
    /// campaign is `active`, marks them `sending` with a lease, and returns
    /// the denormalized send context in one statement.
    pub async fn claim_batch(
        &self,
        limit: i64,
        lease_secs: u64,
    ) -> Result<Vec<ClaimedTarget>, sqlx::Error> {
        sqlx::query_as::<_, ClaimedTarget>(
            r#"
            WITH due AS (
                SELECT t.id
                FROM campaign_targets t
                JOIN campaigns c ON c.id = t.campaign_id
                WHERE t.status = 'queued'
                  AND t.scheduled_at <= NOW()
                  AND c.status = 'active'
                ORDER BY t.scheduled_at ASC
                LIMIT $1
                FOR UPDATE OF t SKIP LOCKED
            ),
            claimed AS (
                UPDATE campaign_targets t SET
                    status = 'sending',
                    claimed_at = NOW(),
                    lease_expires_at = NOW() + make_interval(secs => $2),
                    updated_at = NOW()
                FROM due
                WHERE t.id = due.id
                RETURNING t.id, t.campaign_id, t.lead_id
            )
            SELECT
                cl.id AS target_id,
                l.phone AS recipient_phone,
                l.opted_out,
                c.content_type,
                c.caption_text,
                c.media_path,
                i.id AS instance_id,
                i.base_url AS instance_base_url,
                i.api_key AS instance_api_key
            FROM claimed cl
            JOIN campaigns c ON c.id = cl.campaign_id
            JOIN leads l ON l.id = cl.lead_id
            LEFT JOIN evo_instances i ON i.id = c.instance_id
            "#,
        )
        .bind(limit)
        .bind(lease_secs as f64)
        .fetch_all(&self.pool)
        .await
    }

    /// Mark a claimed target as sent. Only valid from `sending`.
    pub async fn complete_sent(
        &self,
        id: TargetId,
        gateway_message_id: Option<&str>,
        response_payload: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_targets SET
                status = 'sent',
                gateway_message_id = $2,
                response_payload = $3,
                claimed_at = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(gateway_message_id)
        .bind(response_payload)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a claimed target as failed. Only valid from `sending`.
    pub async fn complete_failed(
        &self,
        id: TargetId,
        error_text: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_targets SET
                status = 'failed',
                error_text = $2,
                claimed_at = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(error_text)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cancel all non-terminal targets for a campaign
    pub async fn cancel_by_campaign(&self, campaign_id: CampaignId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_targets SET
                status = 'canceled',
                claimed_at = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE campaign_id = $1 AND status IN ('queued', 'sending')
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Requeue `sending` targets whose claim lease has expired.
    ///
    /// A worker killed mid-batch leaves its claims in `sending`; this sweep
    /// turns that into a bounded, retryable state.
    pub async fn requeue_stale(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_targets SET
                status = 'queued',
                claimed_at = NULL,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE status = 'sending' AND lease_expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Persist scheduler output for one batch of targets.
    ///
    /// Callers chunk oversized campaigns; each call is one transaction.
    /// Only `queued` rows are touched, so a target claimed or canceled
    /// mid-replan keeps its state.
    pub async fn update_schedule_batch(
        &self,
        updates: &[(TargetId, DateTime<Utc>)],
    ) -> Result<u64, sqlx::Error> {
        let mut count = 0u64;
        let mut tx = self.pool.begin().await?;

        for (id, scheduled_at) in updates {
            let result = sqlx::query(
                r#"
                UPDATE campaign_targets SET
                    scheduled_at = $2,
                    updated_at = NOW()
                WHERE id = $1 AND status = 'queued'
                "#,
            )
            .bind(id)
            .bind(scheduled_at)
            .execute(&mut *tx)
            .await?;

            count += result.rows_affected();
        }

        tx.commit().await?;
        Ok(count)
    }

    /// Get target counts by status for a campaign
    pub async fn status_counts(
        &self,
        campaign_id: CampaignId,
    ) -> Result<TargetStatusCounts, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'queued') as queued,
                COUNT(*) FILTER (WHERE status = 'sending') as sending,
                COUNT(*) FILTER (WHERE status = 'sent') as sent,
                COUNT(*) FILTER (WHERE status = 'failed') as failed,
                COUNT(*) FILTER (WHERE status = 'canceled') as canceled
            FROM campaign_targets
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(TargetStatusCounts {
            queued: row.get::<Option<i64>, _>("queued").unwrap_or(0),
            sending: row.get::<Option<i64>, _>("sending").unwrap_or(0),
            sent: row.get::<Option<i64>, _>("sent").unwrap_or(0),
            failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
            canceled: row.get::<Option<i64>, _>("canceled").unwrap_or(0),
        })
    }
}
