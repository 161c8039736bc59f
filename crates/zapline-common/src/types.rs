//! Common types for Zapline

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for clients (campaign owners)
pub type ClientId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for campaign targets
pub type TargetId = Uuid;

/// Unique identifier for leads
pub type LeadId = Uuid;

/// Unique identifier for gateway instances
pub type InstanceId = Uuid;

/// Phone number in E.164 form (`+` followed by 8 to 15 digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse a phone number, requiring E.164 form
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let digits = s.strip_prefix('+')?;
        if (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
            Some(Self(format!("+{}", digits)))
        } else {
            None
        }
    }

    /// The number as stored, including the leading `+`
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            crate::Error::Validation(format!("Invalid E.164 phone number: {}", s))
        })
    }
}
