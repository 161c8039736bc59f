//! Dispatch worker - claims due targets and sends them

use std::sync::Arc;

use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info, warn};
use zapline_common::config::DispatcherConfig;
use zapline_common::types::PhoneNumber;
use zapline_common::{Error, Result};
use zapline_storage::models::{ClaimedTarget, ContentType};

use super::{DispatchFailure, DispatchReport, TargetQueue};
use crate::gateway::{Gateway, InstanceRef, SendReceipt};
use crate::media::MediaResolver;
use crate::schedule::CampaignPlanner;

/// Dispatch worker
///
/// Stateless between invocations; each `run_once` claims a bounded batch,
/// sends each target sequentially, and records a terminal status for every
/// claimed target. Mutual exclusion lives entirely in the store's atomic
/// claim, so overlapping invocations are safe.
pub struct DispatchWorker {
    queue: Arc<dyn TargetQueue>,
    gateway: Arc<dyn Gateway>,
    media: Arc<dyn MediaResolver>,
    config: DispatcherConfig,
    planner: Option<Arc<CampaignPlanner>>,
}

impl DispatchWorker {
    /// Create a new dispatch worker
    pub fn new(
        queue: Arc<dyn TargetQueue>,
        gateway: Arc<dyn Gateway>,
        media: Arc<dyn MediaResolver>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            queue,
            gateway,
            media,
            config,
            planner: None,
        }
    }

    /// Attach a planner so the run loop can mark campaigns completed
    pub fn with_planner(mut self, planner: Arc<CampaignPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Run one dispatch invocation: claim, send, complete.
    ///
    /// A claim failure aborts the whole run with nothing claimed; per-target
    /// failures are recorded and never abort the batch.
    pub async fn run_once(&self) -> Result<DispatchReport> {
        let claimed = self
            .queue
            .claim_batch(self.config.batch_size, self.config.lease_timeout_secs)
            .await?;

        let mut report = DispatchReport::default();
        if claimed.is_empty() {
            return Ok(report);
        }

        debug!("Claimed {} due targets", claimed.len());

        for target in claimed {
            match self.send_target(&target).await {
                Ok(receipt) => {
                    match self
                        .queue
                        .complete_sent(
                            target.target_id,
                            receipt.message_id.as_deref(),
                            &receipt.payload,
                        )
                        .await
                    {
                        Ok(true) => {
                            debug!(
                                "Target {} sent (gateway id: {:?})",
                                target.target_id, receipt.message_id
                            );
                            report.dispatched += 1;
                        }
                        Ok(false) => {
                            // Left `sending` under us, e.g. an external cancel.
                            warn!(
                                "Target {} was sent but no longer claimable for completion",
                                target.target_id
                            );
                        }
                        Err(e) => {
                            // Stranded in `sending`; the lease sweep recovers it.
                            error!(
                                "Failed to record sent for target {}: {}",
                                target.target_id, e
                            );
                            report.failures.push(DispatchFailure {
                                target_id: target.target_id,
                                error: format!("completion write failed: {}", e),
                            });
                        }
                    }
                }
                Err(e) => {
                    let error_text = e.to_string();
                    warn!("Target {} failed: {}", target.target_id, error_text);

                    if let Err(e) = self
                        .queue
                        .complete_failed(target.target_id, &error_text)
                        .await
                    {
                        error!(
                            "Failed to record failure for target {}: {}",
                            target.target_id, e
                        );
                    }
                    report.failures.push(DispatchFailure {
                        target_id: target.target_id,
                        error: error_text,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Send one claimed target through the gateway
    async fn send_target(&self, target: &ClaimedTarget) -> Result<SendReceipt> {
        if target.opted_out {
            return Err(Error::Validation("lead opted out".to_string()));
        }

        let number: PhoneNumber = target.recipient_phone.parse()?;

        let instance = match (target.instance_id, &target.instance_base_url) {
            (Some(instance_id), Some(base_url)) => InstanceRef {
                instance_id,
                base_url: base_url.clone(),
                api_key: target.instance_api_key.clone(),
            },
            _ => {
                return Err(Error::Validation(
                    "campaign has no gateway instance".to_string(),
                ))
            }
        };

        let caption = target.caption_text.as_deref();
        let is_text = target.content_type_enum() == ContentType::Text;

        match &target.media_path {
            Some(media_path) if !is_text => {
                let media_url = self.resolve_media_url(media_path).await?;
                self.gateway
                    .send_media(&instance, number.as_str(), &media_url, caption)
                    .await
                    .map_err(|e| Error::Gateway(e.to_string()))
            }
            _ => self
                .gateway
                .send_text(&instance, number.as_str(), caption.unwrap_or_default())
                .await
                .map_err(|e| Error::Gateway(e.to_string())),
        }
    }

    /// Absolute URLs pass through; stored paths are exchanged for signed URLs
    async fn resolve_media_url(&self, media_path: &str) -> Result<String> {
        if media_path.starts_with("http://") || media_path.starts_with("https://") {
            return Ok(media_path.to_string());
        }
        self.media.resolve(media_path).await
    }

    /// Run the dispatch and sweep loops until the process is stopped
    pub async fn run(&self) {
        let mut dispatch_tick = interval(TokioDuration::from_secs(self.config.poll_interval_secs));
        let mut sweep_tick = interval(TokioDuration::from_secs(self.config.sweep_interval_secs));

        info!(
            "Dispatch worker started (batch: {}, interval: {}s, lease: {}s)",
            self.config.batch_size, self.config.poll_interval_secs, self.config.lease_timeout_secs
        );

        loop {
            tokio::select! {
                _ = dispatch_tick.tick() => {
                    match self.run_once().await {
                        Ok(report) => {
                            if report.dispatched > 0 || !report.failures.is_empty() {
                                info!(
                                    dispatched = report.dispatched,
                                    failed = report.failures.len(),
                                    "Dispatch tick complete"
                                );
                            }
                        }
                        Err(e) => error!("Dispatch tick failed: {}", e),
                    }

                    if let Some(planner) = &self.planner {
                        if let Err(e) = planner.check_active_campaign_completions().await {
                            error!("Campaign completion check failed: {}", e);
                        }
                    }
                }
                _ = sweep_tick.tick() => {
                    match self.queue.requeue_stale().await {
                        Ok(0) => {}
                        Ok(n) => warn!("Requeued {} stale sending targets", n),
                        Err(e) => error!("Stale-lease sweep failed: {}", e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;
    use zapline_common::types::TargetId;

    use super::*;
    use crate::gateway::GatewayError;

    #[derive(Debug, Clone, PartialEq)]
    enum Completion {
        Sent(TargetId, Option<String>),
        Failed(TargetId, String),
    }

    #[derive(Default)]
    struct FakeQueue {
        due: Mutex<Vec<ClaimedTarget>>,
        completions: Mutex<Vec<Completion>>,
        fail_completion_writes: bool,
    }

    impl FakeQueue {
        fn with_due(due: Vec<ClaimedTarget>) -> Self {
            Self {
                due: Mutex::new(due),
                ..Default::default()
            }
        }

        fn completions(&self) -> Vec<Completion> {
            self.completions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TargetQueue for FakeQueue {
        async fn claim_batch(&self, limit: i64, _lease_secs: u64) -> Result<Vec<ClaimedTarget>> {
            let mut due = self.due.lock().unwrap();
            let take = (limit as usize).min(due.len());
            Ok(due.drain(..take).collect())
        }

        async fn complete_sent(
            &self,
            id: TargetId,
            gateway_message_id: Option<&str>,
            _response_payload: &serde_json::Value,
        ) -> Result<bool> {
            if self.fail_completion_writes {
                return Err(Error::Database("connection reset".to_string()));
            }
            self.completions
                .lock()
                .unwrap()
                .push(Completion::Sent(id, gateway_message_id.map(String::from)));
            Ok(true)
        }

        async fn complete_failed(&self, id: TargetId, error_text: &str) -> Result<bool> {
            self.completions
                .lock()
                .unwrap()
                .push(Completion::Failed(id, error_text.to_string()));
            Ok(true)
        }

        async fn requeue_stale(&self) -> Result<u64> {
            Ok(0)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum GatewayCall {
        Text(String, String),
        Media(String, String),
    }

    #[derive(Default)]
    struct FakeGateway {
        calls: Mutex<Vec<GatewayCall>>,
        /// Recipients whose sends fail, with the error message to report
        fail_for: Vec<(String, String)>,
    }

    impl FakeGateway {
        fn calls(&self) -> Vec<GatewayCall> {
            self.calls.lock().unwrap().clone()
        }

        fn check_fail(&self, number: &str) -> std::result::Result<(), GatewayError> {
            for (failing, message) in &self.fail_for {
                if failing == number {
                    return Err(GatewayError::Gateway {
                        status: 500,
                        message: message.clone(),
                    });
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        async fn send_text(
            &self,
            _instance: &InstanceRef,
            number: &str,
            text: &str,
        ) -> std::result::Result<SendReceipt, GatewayError> {
            self.check_fail(number)?;
            self.calls
                .lock()
                .unwrap()
                .push(GatewayCall::Text(number.to_string(), text.to_string()));
            Ok(SendReceipt {
                message_id: Some("WAMID.TEST".to_string()),
                payload: serde_json::json!({"messageId": "WAMID.TEST"}),
            })
        }

        async fn send_media(
            &self,
            _instance: &InstanceRef,
            number: &str,
            media_url: &str,
            _caption: Option<&str>,
        ) -> std::result::Result<SendReceipt, GatewayError> {
            self.check_fail(number)?;
            self.calls
                .lock()
                .unwrap()
                .push(GatewayCall::Media(number.to_string(), media_url.to_string()));
            Ok(SendReceipt {
                message_id: None,
                payload: serde_json::json!({}),
            })
        }
    }

    #[derive(Default)]
    struct FakeResolver {
        resolved: Mutex<Vec<String>>,
    }

    impl FakeResolver {
        fn resolved(&self) -> Vec<String> {
            self.resolved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaResolver for FakeResolver {
        async fn resolve(&self, path: &str) -> Result<String> {
            self.resolved.lock().unwrap().push(path.to_string());
            Ok(format!("https://signed.example.com/{}", path))
        }
    }

    fn text_target(phone: &str) -> ClaimedTarget {
        ClaimedTarget {
            target_id: Uuid::new_v4(),
            recipient_phone: phone.to_string(),
            opted_out: false,
            content_type: "text".to_string(),
            caption_text: Some("hello".to_string()),
            media_path: None,
            instance_id: Some(Uuid::new_v4()),
            instance_base_url: Some("http://gateway.local".to_string()),
            instance_api_key: None,
        }
    }

    fn media_target(phone: &str, media_path: &str) -> ClaimedTarget {
        ClaimedTarget {
            content_type: "image".to_string(),
            media_path: Some(media_path.to_string()),
            ..text_target(phone)
        }
    }

    fn worker(queue: Arc<FakeQueue>, gateway: Arc<FakeGateway>, media: Arc<FakeResolver>) -> DispatchWorker {
        DispatchWorker::new(queue, gateway, media, DispatcherConfig::default())
    }

    #[tokio::test]
    async fn test_empty_claim_is_a_noop() {
        let queue = Arc::new(FakeQueue::default());
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        let report = worker(queue.clone(), gateway.clone(), media).run_once().await.unwrap();

        assert_eq!(report.dispatched, 0);
        assert!(report.failures.is_empty());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_the_batch() {
        let t1 = text_target("+111111111111");
        let t2 = text_target("+122222222222");
        let t3 = text_target("+133333333333");
        let failing_id = t2.target_id;

        let queue = Arc::new(FakeQueue::with_due(vec![t1, t2, t3]));
        let gateway = Arc::new(FakeGateway {
            fail_for: vec![("+122222222222".to_string(), "rate limited".to_string())],
            ..Default::default()
        });
        let media = Arc::new(FakeResolver::default());

        let report = worker(queue.clone(), gateway, media).run_once().await.unwrap();

        assert_eq!(report.dispatched, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target_id, failing_id);
        assert!(report.failures[0].error.contains("rate limited"));

        // Every claimed target reached a terminal completion exactly once.
        let completions = queue.completions();
        assert_eq!(completions.len(), 3);
        assert!(completions
            .iter()
            .any(|c| matches!(c, Completion::Failed(id, _) if *id == failing_id)));
    }

    #[tokio::test]
    async fn test_text_target_never_touches_media() {
        let queue = Arc::new(FakeQueue::with_due(vec![text_target("+14155552671")]));
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        let report = worker(queue, gateway.clone(), media.clone())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.dispatched, 1);
        assert!(media.resolved().is_empty());
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::Text(
                "+14155552671".to_string(),
                "hello".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_media_content_without_path_falls_back_to_text() {
        let mut target = text_target("+14155552671");
        target.content_type = "image".to_string();

        let queue = Arc::new(FakeQueue::with_due(vec![target]));
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        worker(queue, gateway.clone(), media.clone()).run_once().await.unwrap();

        assert!(media.resolved().is_empty());
        assert!(matches!(gateway.calls()[0], GatewayCall::Text(_, _)));
    }

    #[tokio::test]
    async fn test_absolute_media_url_passes_through() {
        let queue = Arc::new(FakeQueue::with_due(vec![media_target(
            "+14155552671",
            "https://cdn.example.com/promo.png",
        )]));
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        worker(queue, gateway.clone(), media.clone()).run_once().await.unwrap();

        assert!(media.resolved().is_empty());
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::Media(
                "+14155552671".to_string(),
                "https://cdn.example.com/promo.png".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_stored_media_path_is_signed() {
        let queue = Arc::new(FakeQueue::with_due(vec![media_target(
            "+14155552671",
            "campaigns/42/promo.png",
        )]));
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        let report = worker(queue, gateway.clone(), media.clone())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.dispatched, 1);
        assert_eq!(media.resolved(), vec!["campaigns/42/promo.png".to_string()]);
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::Media(
                "+14155552671".to_string(),
                "https://signed.example.com/campaigns/42/promo.png".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_opted_out_lead_fails_without_sending() {
        let mut target = text_target("+14155552671");
        target.opted_out = true;
        let id = target.target_id;

        let queue = Arc::new(FakeQueue::with_due(vec![target]));
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        let report = worker(queue.clone(), gateway.clone(), media).run_once().await.unwrap();

        assert_eq!(report.dispatched, 0);
        assert!(report.failures[0].error.contains("opted out"));
        assert!(gateway.calls().is_empty());
        assert_eq!(queue.completions().len(), 1);
        assert!(matches!(&queue.completions()[0], Completion::Failed(got, _) if *got == id));
    }

    #[tokio::test]
    async fn test_missing_instance_fails_the_target() {
        let mut target = text_target("+14155552671");
        target.instance_id = None;
        target.instance_base_url = None;

        let queue = Arc::new(FakeQueue::with_due(vec![target]));
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        let report = worker(queue, gateway.clone(), media).run_once().await.unwrap();

        assert_eq!(report.dispatched, 0);
        assert!(report.failures[0].error.contains("no gateway instance"));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_phone_fails_the_target() {
        let target = text_target("not-a-number");

        let queue = Arc::new(FakeQueue::with_due(vec![target]));
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        let report = worker(queue, gateway.clone(), media).run_once().await.unwrap();

        assert_eq!(report.dispatched, 0);
        assert!(report.failures[0].error.contains("Invalid E.164"));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_completion_write_failure_is_reported() {
        let target = text_target("+14155552671");
        let id = target.target_id;

        let queue = Arc::new(FakeQueue {
            due: Mutex::new(vec![target]),
            fail_completion_writes: true,
            ..Default::default()
        });
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        let report = worker(queue, gateway, media).run_once().await.unwrap();

        assert_eq!(report.dispatched, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target_id, id);
        assert!(report.failures[0].error.contains("completion write failed"));
    }

    #[tokio::test]
    async fn test_claim_respects_batch_size() {
        let due: Vec<_> = (0..30)
            .map(|i| text_target(&format!("+1415555{:04}", i)))
            .collect();
        let queue = Arc::new(FakeQueue::with_due(due));
        let gateway = Arc::new(FakeGateway::default());
        let media = Arc::new(FakeResolver::default());

        let report = worker(queue.clone(), gateway, media).run_once().await.unwrap();

        // Default batch size is 20; the rest stay queued for the next tick.
        assert_eq!(report.dispatched, 20);
        assert_eq!(queue.due.lock().unwrap().len(), 10);
    }
}
