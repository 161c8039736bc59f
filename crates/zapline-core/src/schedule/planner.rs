//! Campaign planner - campaign lifecycle and target planning

use chrono::{DateTime, Utc, Weekday};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use zapline_common::types::CampaignId;
use zapline_storage::models::{CampaignStatus, CreateCampaignTarget, TargetStatusCounts};
use zapline_storage::repository::{CampaignRepository, LeadRepository, TargetRepository};

use super::weekday::{assign_send_times, send_time_slots, ScheduleError};

/// Leads are fetched and targets written in bounded batches so one oversized
/// campaign cannot blow a single transaction.
const PLAN_BATCH_SIZE: i64 = 500;

/// Planner errors
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Campaign is not in draft status")]
    NotDraft,

    #[error("Campaign is not in a pausable/cancelable status")]
    InvalidStatus,

    #[error("Client has no sendable leads")]
    NoLeads,

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Campaign planner - creates targets, applies schedules, drives lifecycle
pub struct CampaignPlanner {
    campaign_repo: CampaignRepository,
    lead_repo: LeadRepository,
    target_repo: TargetRepository,
}

impl CampaignPlanner {
    /// Create a new campaign planner
    pub fn new(pool: PgPool) -> Self {
        Self {
            campaign_repo: CampaignRepository::new(pool.clone()),
            lead_repo: LeadRepository::new(pool.clone()),
            target_repo: TargetRepository::new(pool),
        }
    }

    /// Plan a draft campaign: create queued targets for the client's
    /// sendable leads and activate the campaign.
    ///
    /// Initial send times come from the scheduler with every weekday
    /// allowed; `apply_weekday_schedule` re-times them afterwards if the
    /// campaign restricts days.
    pub async fn schedule_targets(&self, campaign_id: CampaignId) -> Result<u64, PlannerError> {
        let campaign = self
            .campaign_repo
            .get(campaign_id)
            .await?
            .ok_or(PlannerError::NotFound)?;

        if campaign.status_enum() != Some(CampaignStatus::Draft) {
            return Err(PlannerError::NotDraft);
        }

        let sendable = self
            .lead_repo
            .count_sendable_by_client(campaign.client_id)
            .await?;
        if sendable == 0 {
            return Err(PlannerError::NoLeads);
        }

        let cap = match campaign.target_count {
            Some(n) if (n as i64) < sendable => n as i64,
            _ => sendable,
        };

        let daily_volume = positive_volume(campaign.daily_volume)?;
        let all_days = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        let slots = send_time_slots(cap as usize, campaign.start_at, daily_volume, &all_days)?;

        let mut created = 0u64;
        let mut offset = 0i64;
        let mut slot_iter = slots.into_iter();

        while offset < cap {
            let page = (cap - offset).min(PLAN_BATCH_SIZE);
            let leads = self
                .lead_repo
                .list_sendable_by_client(campaign.client_id, page, offset)
                .await?;

            if leads.is_empty() {
                break;
            }

            let targets: Vec<CreateCampaignTarget> = leads
                .into_iter()
                .zip(&mut slot_iter)
                .map(|(lead, scheduled_at)| CreateCampaignTarget {
                    campaign_id,
                    lead_id: lead.id,
                    scheduled_at,
                })
                .collect();

            created += self.target_repo.create_batch(targets).await?;
            offset += page;
        }

        self.campaign_repo
            .set_target_count(campaign_id, created as i32)
            .await?;
        self.campaign_repo
            .update_status(campaign_id, CampaignStatus::Active)
            .await?
            .ok_or(PlannerError::NotFound)?;

        info!(
            "Campaign {} planned with {} targets, starting at {}",
            campaign_id, created, campaign.start_at
        );

        Ok(created)
    }

    /// Re-time a campaign's queued targets with a weekday restriction.
    ///
    /// Targets are taken in creation order; `start_at` and `daily_volume`
    /// default to the campaign row. Updates are persisted in batches of
    /// [`PLAN_BATCH_SIZE`].
    pub async fn apply_weekday_schedule(
        &self,
        campaign_id: CampaignId,
        weekdays: &[Weekday],
        start_at: Option<DateTime<Utc>>,
        daily_volume: Option<u32>,
    ) -> Result<u64, PlannerError> {
        let campaign = self
            .campaign_repo
            .get(campaign_id)
            .await?
            .ok_or(PlannerError::NotFound)?;

        match campaign.status_enum() {
            Some(CampaignStatus::Draft | CampaignStatus::Active | CampaignStatus::Paused) => {}
            _ => return Err(PlannerError::InvalidStatus),
        }

        let start_at = start_at.unwrap_or(campaign.start_at);
        let daily_volume = match daily_volume {
            Some(v) => v,
            None => positive_volume(campaign.daily_volume)?,
        };

        let queued = self.target_repo.list_queued_by_campaign(campaign_id).await?;
        let ids: Vec<_> = queued.iter().map(|t| t.id).collect();

        let assignments = assign_send_times(&ids, start_at, daily_volume, weekdays)?;

        let mut updated = 0u64;
        for chunk in assignments.chunks(PLAN_BATCH_SIZE as usize) {
            updated += self.target_repo.update_schedule_batch(chunk).await?;
        }

        info!(
            "Campaign {} rescheduled: {} targets across weekdays {:?}",
            campaign_id, updated, weekdays
        );

        Ok(updated)
    }

    /// Pause an active campaign
    pub async fn pause_campaign(&self, campaign_id: CampaignId) -> Result<(), PlannerError> {
        let campaign = self
            .campaign_repo
            .get(campaign_id)
            .await?
            .ok_or(PlannerError::NotFound)?;

        if campaign.status_enum() != Some(CampaignStatus::Active) {
            return Err(PlannerError::InvalidStatus);
        }

        self.campaign_repo
            .update_status(campaign_id, CampaignStatus::Paused)
            .await?
            .ok_or(PlannerError::NotFound)?;

        info!("Campaign {} paused", campaign_id);
        Ok(())
    }

    /// Resume a paused campaign
    pub async fn resume_campaign(&self, campaign_id: CampaignId) -> Result<(), PlannerError> {
        let campaign = self
            .campaign_repo
            .get(campaign_id)
            .await?
            .ok_or(PlannerError::NotFound)?;

        if campaign.status_enum() != Some(CampaignStatus::Paused) {
            return Err(PlannerError::InvalidStatus);
        }

        self.campaign_repo
            .update_status(campaign_id, CampaignStatus::Active)
            .await?
            .ok_or(PlannerError::NotFound)?;

        info!("Campaign {} resumed", campaign_id);
        Ok(())
    }

    /// Cancel a campaign and its non-terminal targets
    pub async fn cancel_campaign(&self, campaign_id: CampaignId) -> Result<u64, PlannerError> {
        let campaign = self
            .campaign_repo
            .get(campaign_id)
            .await?
            .ok_or(PlannerError::NotFound)?;

        match campaign.status_enum() {
            Some(CampaignStatus::Draft | CampaignStatus::Active | CampaignStatus::Paused) => {}
            _ => return Err(PlannerError::InvalidStatus),
        }

        let canceled = self.target_repo.cancel_by_campaign(campaign_id).await?;

        self.campaign_repo
            .update_status(campaign_id, CampaignStatus::Canceled)
            .await?
            .ok_or(PlannerError::NotFound)?;

        info!(
            "Campaign {} canceled, {} pending targets canceled",
            campaign_id, canceled
        );

        Ok(canceled)
    }

    /// Mark a campaign completed once no queued or sending targets remain
    pub async fn check_campaign_completion(
        &self,
        campaign_id: CampaignId,
    ) -> Result<bool, PlannerError> {
        let counts = self.target_repo.status_counts(campaign_id).await?;

        if counts.queued == 0 && counts.sending == 0 {
            self.campaign_repo
                .update_status(campaign_id, CampaignStatus::Completed)
                .await?;

            info!("Campaign {} completed", campaign_id);
            return Ok(true);
        }

        Ok(false)
    }

    /// Run the completion check across all active campaigns
    pub async fn check_active_campaign_completions(&self) -> Result<(), PlannerError> {
        for campaign in self.campaign_repo.list_active().await? {
            self.check_campaign_completion(campaign.id).await?;
        }
        Ok(())
    }

    /// Per-status target counts for a campaign
    pub async fn campaign_stats(
        &self,
        campaign_id: CampaignId,
    ) -> Result<TargetStatusCounts, PlannerError> {
        Ok(self.target_repo.status_counts(campaign_id).await?)
    }
}

/// Campaign rows store `daily_volume` as an integer column; anything
/// non-positive is a broken row, surfaced as the scheduler's own error.
fn positive_volume(value: i32) -> Result<u32, ScheduleError> {
    u32::try_from(value).ok().filter(|v| *v > 0).ok_or(ScheduleError::ZeroDailyVolume)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_volume() {
        assert_eq!(positive_volume(30).unwrap(), 30);
        assert_eq!(positive_volume(0).unwrap_err(), ScheduleError::ZeroDailyVolume);
        assert_eq!(positive_volume(-5).unwrap_err(), ScheduleError::ZeroDailyVolume);
    }
}
