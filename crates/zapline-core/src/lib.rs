//! Zapline Core - campaign scheduling and dispatch
//!
//! This crate provides the weekday-aware scheduler, the claim/send/complete
//! dispatch worker, and the thin clients for the WhatsApp gateway and the
//! media signing service.

pub mod dispatch;
pub mod gateway;
pub mod media;
pub mod schedule;

pub use dispatch::{DispatchFailure, DispatchReport, DispatchWorker, TargetQueue};
pub use gateway::{EvoGatewayClient, Gateway, GatewayError, InstanceRef, SendReceipt};
pub use media::{MediaResolver, SignedUrlClient};
pub use schedule::{assign_send_times, CampaignPlanner, PlannerError, ScheduleError};
