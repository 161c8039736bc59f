//! Campaign scheduling
//!
//! `weekday` holds the pure timestamp-assignment algorithm; `planner` applies
//! it to campaigns and owns the campaign lifecycle transitions.

pub mod planner;
pub mod weekday;

pub use planner::{CampaignPlanner, PlannerError};
pub use weekday::{assign_send_times, send_time_slots, ScheduleError};
