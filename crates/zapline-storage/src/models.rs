//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use zapline_common::types::{CampaignId, ClientId, InstanceId, LeadId, TargetId};

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Canceled,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Active => write!(f, "active"),
            CampaignStatus::Paused => write!(f, "paused"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            "canceled" => Ok(CampaignStatus::Canceled),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Campaign content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Text => write!(f, "text"),
            ContentType::Image => write!(f, "image"),
            ContentType::Video => write!(f, "video"),
            ContentType::Audio => write!(f, "audio"),
            ContentType::Document => write!(f, "document"),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            "video" => Ok(ContentType::Video),
            "audio" => Ok(ContentType::Audio),
            "document" => Ok(ContentType::Document),
            _ => Err(format!("Invalid content type: {}", s)),
        }
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub client_id: ClientId,
    pub name: String,
    pub content_type: String,
    pub caption_text: Option<String>,
    pub media_path: Option<String>,
    pub instance_id: Option<InstanceId>,
    pub start_at: DateTime<Utc>,
    pub daily_volume: i32,
    pub target_count: Option<i32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }
}

/// Campaign target status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Queued,
    Sending,
    Sent,
    Failed,
    Canceled,
}

impl TargetStatus {
    /// Terminal statuses never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TargetStatus::Sent | TargetStatus::Failed | TargetStatus::Canceled
        )
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetStatus::Queued => write!(f, "queued"),
            TargetStatus::Sending => write!(f, "sending"),
            TargetStatus::Sent => write!(f, "sent"),
            TargetStatus::Failed => write!(f, "failed"),
            TargetStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for TargetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TargetStatus::Queued),
            "sending" => Ok(TargetStatus::Sending),
            "sent" => Ok(TargetStatus::Sent),
            "failed" => Ok(TargetStatus::Failed),
            "canceled" => Ok(TargetStatus::Canceled),
            _ => Err(format!("Invalid target status: {}", s)),
        }
    }
}

/// Campaign target model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignTarget {
    pub id: TargetId,
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub gateway_message_id: Option<String>,
    pub response_payload: Option<serde_json::Value>,
    pub error_text: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignTarget {
    /// Get status enum
    pub fn status_enum(&self) -> Option<TargetStatus> {
        self.status.parse().ok()
    }
}

/// Input for bulk target creation
#[derive(Debug, Clone)]
pub struct CreateCampaignTarget {
    pub campaign_id: CampaignId,
    pub lead_id: LeadId,
    pub scheduled_at: DateTime<Utc>,
}

/// Denormalized send context returned by the atomic claim
#[derive(Debug, Clone, FromRow)]
pub struct ClaimedTarget {
    pub target_id: TargetId,
    pub recipient_phone: String,
    pub opted_out: bool,
    pub content_type: String,
    pub caption_text: Option<String>,
    pub media_path: Option<String>,
    pub instance_id: Option<InstanceId>,
    pub instance_base_url: Option<String>,
    pub instance_api_key: Option<String>,
}

impl ClaimedTarget {
    /// Get content type enum, defaulting to text when the row is malformed
    pub fn content_type_enum(&self) -> ContentType {
        self.content_type.parse().unwrap_or(ContentType::Text)
    }
}

/// Lead model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub client_id: ClientId,
    pub name: Option<String>,
    pub phone: String,
    pub opted_out: bool,
    pub created_at: DateTime<Utc>,
}

/// Target counts by status for a campaign
#[derive(Debug, Clone, Default)]
pub struct TargetStatusCounts {
    pub queued: i64,
    pub sending: i64,
    pub sent: i64,
    pub failed: i64,
    pub canceled: i64,
}

impl TargetStatusCounts {
    pub fn total(&self) -> i64 {
        self.queued + self.sending + self.sent + self.failed + self.canceled
    }

    /// Targets that have reached a terminal status
    pub fn completed(&self) -> i64 {
        self.sent + self.failed + self.canceled
    }
}
