//! Batch dispatch of claimed campaign targets

pub mod worker;

use async_trait::async_trait;
use serde::Serialize;
use zapline_common::types::TargetId;
use zapline_common::{Error, Result};
use zapline_storage::models::ClaimedTarget;
use zapline_storage::repository::TargetRepository;

pub use worker::DispatchWorker;

/// Claim/complete operations the worker needs from the target store.
///
/// The store is the only synchronization point: the claim must be atomic so
/// overlapping worker invocations never process the same target.
#[async_trait]
pub trait TargetQueue: Send + Sync {
    /// Atomically claim up to `limit` due targets with a lease
    async fn claim_batch(&self, limit: i64, lease_secs: u64) -> Result<Vec<ClaimedTarget>>;

    /// Record a successful send; terminal
    async fn complete_sent(
        &self,
        id: TargetId,
        gateway_message_id: Option<&str>,
        response_payload: &serde_json::Value,
    ) -> Result<bool>;

    /// Record a failed send; terminal
    async fn complete_failed(&self, id: TargetId, error_text: &str) -> Result<bool>;

    /// Requeue `sending` targets whose lease expired
    async fn requeue_stale(&self) -> Result<u64>;
}

#[async_trait]
impl TargetQueue for TargetRepository {
    async fn claim_batch(&self, limit: i64, lease_secs: u64) -> Result<Vec<ClaimedTarget>> {
        TargetRepository::claim_batch(self, limit, lease_secs)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn complete_sent(
        &self,
        id: TargetId,
        gateway_message_id: Option<&str>,
        response_payload: &serde_json::Value,
    ) -> Result<bool> {
        TargetRepository::complete_sent(self, id, gateway_message_id, response_payload)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn complete_failed(&self, id: TargetId, error_text: &str) -> Result<bool> {
        TargetRepository::complete_failed(self, id, error_text)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn requeue_stale(&self) -> Result<u64> {
        TargetRepository::requeue_stale(self)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// One failed target within a batch run
#[derive(Debug, Clone, Serialize)]
pub struct DispatchFailure {
    pub target_id: TargetId,
    pub error: String,
}

/// Outcome of one dispatch invocation
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    /// Targets sent and recorded as `sent`
    pub dispatched: usize,
    /// Targets that reached `failed`, with their error text
    pub failures: Vec<DispatchFailure>,
}
