//! Repository layer for data access

pub mod campaigns;
pub mod leads;
pub mod targets;

pub use campaigns::CampaignRepository;
pub use leads::LeadRepository;
pub use targets::TargetRepository;
