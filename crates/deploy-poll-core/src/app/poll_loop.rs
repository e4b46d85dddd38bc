//! PollLoop - キューを 1 件ずつ処理する制御ループ
//!
//! # フロー
//! 1. QueueClient::receive_one() で高々 1 件受信
//! 2. MessageValidator → StalenessFilter
//! 3. 成功なら DispatchInvoker で起動（待たない）→ delete
//! 4. 失敗なら delete（`redeliver` ポリシーの不完全 payload だけは残す）
//!
//! 1 件を最後まで処理してから次の receive に進む（並行処理しない）。
//! 停止シグナルは receive とだけ競合させる。受信済みのメッセージは必ず処理しきる。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use super::{DispatchInvoker, MessageValidator, StalenessFilter};
use crate::config::IncompletePayloadPolicy;
use crate::domain::{Disposition, PollState, QueueError, QueueMessage, Rejection};
use crate::observability::PollStats;
use crate::ports::QueueClient;

pub struct PollLoop {
    queue: Arc<dyn QueueClient>,
    validator: MessageValidator,
    staleness: StalenessFilter,
    invoker: DispatchInvoker,
    incomplete_payload: IncompletePayloadPolicy,
    idle_interval: Duration,
    stats: Mutex<PollStats>,
}

fn advance(from: PollState, to: PollState) -> PollState {
    debug_assert!(
        from.can_transition_to(to),
        "illegal poll state transition {from:?} -> {to:?}"
    );
    trace!(?from, ?to, "poll state");
    to
}

impl PollLoop {
    pub fn new(
        queue: Arc<dyn QueueClient>,
        validator: MessageValidator,
        staleness: StalenessFilter,
        invoker: DispatchInvoker,
        incomplete_payload: IncompletePayloadPolicy,
        idle_interval: Duration,
    ) -> Self {
        Self {
            queue,
            validator,
            staleness,
            invoker,
            incomplete_payload,
            idle_interval,
            stats: Mutex::new(PollStats::default()),
        }
    }

    /// Snapshot of the counters so far.
    pub fn stats(&self) -> PollStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn update_stats(&self, f: impl FnOnce(&mut PollStats)) {
        f(&mut self.stats.lock().unwrap_or_else(|e| e.into_inner()));
    }

    /// Poll until `shutdown` turns `true` (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> PollStats {
        info!("poll loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                received = self.queue.receive_one() => received,
            };

            match received {
                Ok(Some(message)) => {
                    self.handle(message).await;
                }
                Ok(None) => {
                    trace!("no message within polling window");
                    self.update_stats(|s| s.empty_receives += 1);
                    self.idle(&mut shutdown).await;
                }
                Err(err) => {
                    warn!(error = %err, "receive failed");
                    self.update_stats(|s| s.receive_errors += 1);
                    self.idle(&mut shutdown).await;
                }
            }
        }

        let stats = self.stats();
        info!(
            received = stats.received,
            dispatched = stats.dispatched,
            discarded = stats.discarded,
            left_for_redelivery = stats.left_for_redelivery,
            "poll loop stopped"
        );
        stats
    }

    async fn idle(&self, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(self.idle_interval) => {}
            _ = shutdown.changed() => {}
        }
    }

    /// One receive, plus handling of whatever arrived.
    pub async fn poll_once(&self) -> Result<Option<Disposition>, QueueError> {
        let received = self.queue.receive_one().await.inspect_err(|_| {
            self.update_stats(|s| s.receive_errors += 1);
        })?;
        match received {
            Some(message) => Ok(Some(self.handle(message).await)),
            None => {
                self.update_stats(|s| s.empty_receives += 1);
                Ok(None)
            }
        }
    }

    /// Take one received message all the way to its disposition.
    pub async fn handle(&self, message: QueueMessage) -> Disposition {
        let mut state = advance(PollState::Idle, PollState::Received);
        debug!(
            message_id = message.message_id(),
            sent_timestamp = message.sent_timestamp(),
            sender_ip = message.sender_ip(),
            body = message.body(),
            "found new message"
        );

        state = advance(state, PollState::Validating);
        let verdict = self.validator.validate(&message).and_then(|validated| {
            self.staleness.check(validated.sent_at)?;
            Ok(validated)
        });

        let disposition = match verdict {
            Ok(validated) => {
                state = advance(state, PollState::Dispatching);
                let disposition = match self
                    .invoker
                    .invoke(&validated.request, &validated.sender_ip)
                    .await
                {
                    Ok(handle) => Disposition::Dispatched { pid: handle.pid },
                    Err(err) => {
                        error!(
                            message_id = message.message_id(),
                            sender_ip = %validated.sender_ip,
                            error = %err,
                            "failed to launch deployment"
                        );
                        Disposition::DispatchFailed {
                            error: err.to_string(),
                        }
                    }
                };
                self.acknowledge(&message).await;
                disposition
            }
            Err(rejection) => {
                state = advance(state, PollState::Discarding);
                if self.should_redeliver(&rejection) {
                    warn!(
                        message_id = message.message_id(),
                        reason = %rejection,
                        "skipping message, leaving it for redelivery"
                    );
                    Disposition::LeftForRedelivery(rejection)
                } else {
                    warn!(
                        message_id = message.message_id(),
                        reason = %rejection,
                        "discarding message"
                    );
                    self.acknowledge(&message).await;
                    Disposition::Discarded(rejection)
                }
            }
        };

        advance(state, PollState::Idle);
        self.update_stats(|s| s.record(&disposition));
        disposition
    }

    fn should_redeliver(&self, rejection: &Rejection) -> bool {
        match (self.incomplete_payload, rejection) {
            (IncompletePayloadPolicy::Redeliver, Rejection::MissingParameter { sent_at, .. }) => {
                !self.staleness.is_stale(*sent_at)
            }
            _ => false,
        }
    }

    /// Delete once. Failures are logged, never propagated.
    async fn acknowledge(&self, message: &QueueMessage) {
        match self.queue.delete(message.receipt_handle()).await {
            Ok(()) => {
                debug!(message_id = message.message_id(), "message deleted");
            }
            Err(QueueError::ReceiptExpired(_)) => {
                warn!(
                    message_id = message.message_id(),
                    "message already deleted or its lease expired"
                );
            }
            Err(err) => {
                warn!(
                    message_id = message.message_id(),
                    error = %err,
                    "failed to delete message"
                );
                self.update_stats(|s| s.delete_failures += 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;
    use tokio::sync::watch;
    use tracing_test::traced_test;

    use super::PollLoop;
    use crate::app::PollLoopBuilder;
    use crate::config::{DeployPollConfig, IncompletePayloadPolicy};
    use crate::domain::{
        Disposition, LaunchError, QueueError, QueueMessage, ReceiptHandle, Rejection,
    };
    use crate::impls::{InMemoryQueueClient, RecordingLauncher};
    use crate::ports::{
        CommandLauncher, DispatchCommand, FixedClock, ProcessHandle, QueueClient,
    };

    const SENDER: &str = "10.0.0.5";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    fn config(policy: IncompletePayloadPolicy) -> DeployPollConfig {
        let mut config = DeployPollConfig::from_toml(
            r#"
            [queue]
            url = "memory://deploys"
            idle_interval_ms = 10

            [dispatch]
            private_key_file = "/etc/deploy/id_rsa"
            playbooks_dir = "/opt/playbooks"
            required_parameters = ["env", "target"]
            "#,
        )
        .unwrap();
        config.dispatch.incomplete_payload = policy;
        config
    }

    fn message(id: &str, body: &str, age_ms: i64) -> QueueMessage {
        let sent = now() - chrono::Duration::milliseconds(age_ms);
        QueueMessage::new(id, ReceiptHandle::new(format!("rh-{id}")), body)
            .with_sent_timestamp(sent.timestamp_millis().to_string())
            .with_sender_ip(SENDER)
    }

    struct Harness {
        queue: Arc<InMemoryQueueClient>,
        launcher: Arc<RecordingLauncher>,
        poller: PollLoop,
    }

    fn harness_with(policy: IncompletePayloadPolicy, launcher: RecordingLauncher) -> Harness {
        let config = config(policy);
        let queue = Arc::new(InMemoryQueueClient::new(Duration::from_millis(20)));
        let launcher = Arc::new(launcher);
        let poller = PollLoopBuilder::new(&config)
            .queue(queue.clone())
            .launcher(launcher.clone())
            .clock(Arc::new(FixedClock::new(now())))
            .build()
            .unwrap();
        Harness {
            queue,
            launcher,
            poller,
        }
    }

    fn harness(policy: IncompletePayloadPolicy) -> Harness {
        harness_with(policy, RecordingLauncher::new())
    }

    #[tokio::test]
    async fn valid_message_is_dispatched_and_deleted_once() {
        let h = harness(IncompletePayloadPolicy::Discard);
        h.queue
            .send(message("m1", r#"{"env":"prod","target":"web"}"#, 5_000))
            .await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        assert!(disposition.dispatched());

        let launched = h.launcher.launched();
        assert_eq!(launched.len(), 1);
        assert_eq!(
            launched[0].args,
            vec![
                "--private-key",
                "/etc/deploy/id_rsa",
                "-i",
                "10.0.0.5,",
                "-e env=prod -e target=web",
                "/opt/playbooks/site.yml",
            ]
        );

        let receipt = ReceiptHandle::new("rh-m1");
        assert_eq!(h.queue.deleted().await, vec![receipt.clone()]);
        assert_eq!(h.queue.delete_calls(&receipt).await, 1);
        assert_eq!(h.queue.in_flight_len().await, 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn stale_message_is_deleted_without_dispatch() {
        let h = harness(IncompletePayloadPolicy::Discard);
        h.queue
            .send(message("m1", r#"{"env":"prod","target":"web"}"#, 90_000))
            .await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        assert!(matches!(
            disposition,
            Disposition::Discarded(Rejection::Stale { .. })
        ));
        assert_eq!(h.launcher.launch_count(), 0);
        assert_eq!(h.queue.deleted().await.len(), 1);

        assert!(logs_contain("discarding message"));
        assert!(logs_contain("older than 60 seconds"));
    }

    #[rstest]
    #[case::fresh(5_000)]
    #[case::at_threshold(60_000)]
    #[tokio::test]
    async fn fresh_enough_messages_are_dispatched(#[case] age_ms: i64) {
        let h = harness(IncompletePayloadPolicy::Discard);
        h.queue
            .send(message("m1", r#"{"env":"prod","target":"web"}"#, age_ms))
            .await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        assert!(disposition.dispatched());
        assert_eq!(h.launcher.launch_count(), 1);
    }

    #[rstest]
    #[case::absent(None)]
    #[case::word(Some("soon"))]
    #[case::empty(Some(""))]
    #[tokio::test]
    async fn bad_timestamp_is_deleted_without_dispatch(#[case] raw: Option<&str>) {
        let h = harness(IncompletePayloadPolicy::Discard);
        let mut msg = QueueMessage::new(
            "m1",
            ReceiptHandle::new("rh-m1"),
            r#"{"env":"prod","target":"web"}"#,
        )
        .with_sender_ip(SENDER);
        if let Some(raw) = raw {
            msg = msg.with_sent_timestamp(raw);
        }
        h.queue.send(msg).await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        assert!(matches!(
            disposition,
            Disposition::Discarded(Rejection::MissingTimestamp | Rejection::InvalidTimestamp(_))
        ));
        assert_eq!(h.launcher.launch_count(), 0);
        assert_eq!(h.queue.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_sender_is_deleted_without_dispatch() {
        let h = harness(IncompletePayloadPolicy::Discard);
        let msg = QueueMessage::new(
            "m1",
            ReceiptHandle::new("rh-m1"),
            r#"{"env":"prod","target":"web"}"#,
        )
        .with_sent_timestamp(now().timestamp_millis().to_string());
        h.queue.send(msg).await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        assert_eq!(disposition, Disposition::Discarded(Rejection::MissingSender));
        assert_eq!(h.launcher.launch_count(), 0);
        assert_eq!(h.queue.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_body_is_deleted_without_dispatch() {
        let h = harness(IncompletePayloadPolicy::Discard);
        h.queue.send(message("m1", "{env: prod", 1_000)).await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        assert!(matches!(
            disposition,
            Disposition::Discarded(Rejection::MalformedBody(_))
        ));
        assert_eq!(h.launcher.launch_count(), 0);
        assert_eq!(h.queue.deleted().await.len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn incomplete_payload_is_deleted_under_discard_policy() {
        let h = harness(IncompletePayloadPolicy::Discard);
        h.queue.send(message("m1", r#"{"env":"prod"}"#, 1_000)).await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        match &disposition {
            Disposition::Discarded(Rejection::MissingParameter { name, .. }) => {
                assert_eq!(name, "target")
            }
            other => panic!("unexpected disposition {other:?}"),
        }
        assert_eq!(h.launcher.launch_count(), 0);
        assert_eq!(h.queue.deleted().await.len(), 1);
        assert_eq!(h.queue.in_flight_len().await, 0);

        assert!(logs_contain("discarding message"));
        assert!(logs_contain("missing required parameter target"));
    }

    #[tokio::test]
    async fn incomplete_payload_is_redelivered_under_redeliver_policy() {
        let h = harness(IncompletePayloadPolicy::Redeliver);
        h.queue.send(message("m1", r#"{"env":"prod"}"#, 1_000)).await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        assert!(matches!(
            disposition,
            Disposition::LeftForRedelivery(Rejection::MissingParameter { .. })
        ));
        assert!(!disposition.acknowledged());
        assert_eq!(h.launcher.launch_count(), 0);
        assert!(h.queue.deleted().await.is_empty());
        assert_eq!(h.queue.in_flight_len().await, 1);

        // lease expires -> the same message comes back
        h.queue.expire_leases().await;
        let again = h.poller.poll_once().await.unwrap().unwrap();
        assert!(matches!(again, Disposition::LeftForRedelivery(_)));
        assert_eq!(
            h.queue.received().await,
            vec![ReceiptHandle::new("rh-m1"), ReceiptHandle::new("rh-m1")]
        );
    }

    #[tokio::test]
    async fn stale_incomplete_payload_is_deleted_even_under_redeliver_policy() {
        let h = harness(IncompletePayloadPolicy::Redeliver);
        h.queue.send(message("m1", r#"{"env":"prod"}"#, 90_000)).await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        assert!(matches!(
            disposition,
            Disposition::Discarded(Rejection::MissingParameter { .. })
        ));
        assert_eq!(h.queue.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn launch_failure_still_deletes_message() {
        let h = harness_with(IncompletePayloadPolicy::Discard, RecordingLauncher::failing());
        h.queue
            .send(message("m1", r#"{"env":"prod","target":"web"}"#, 1_000))
            .await;

        let disposition = h.poller.poll_once().await.unwrap().unwrap();
        assert!(matches!(disposition, Disposition::DispatchFailed { .. }));
        assert_eq!(h.launcher.launch_count(), 1);
        assert_eq!(h.queue.deleted().await.len(), 1);
        assert_eq!(h.poller.stats().dispatch_failures, 1);
    }

    #[tokio::test]
    async fn poll_once_counts_receive_errors() {
        let h = harness(IncompletePayloadPolicy::Discard);
        h.queue.fail_next_receives(1).await;

        let err = h.poller.poll_once().await.unwrap_err();
        assert!(matches!(err, QueueError::Receive(_)));
        assert_eq!(h.poller.stats().receive_errors, 1);
        assert_eq!(h.poller.stats().received, 0);
    }

    #[tokio::test]
    async fn empty_queue_yields_nothing() {
        let h = harness(IncompletePayloadPolicy::Discard);
        assert!(h.poller.poll_once().await.unwrap().is_none());
        assert_eq!(h.poller.stats().empty_receives, 1);
    }

    /// Shared event journal for ordering checks.
    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct JournalQueue {
        inner: InMemoryQueueClient,
        journal: Journal,
    }

    #[async_trait]
    impl QueueClient for JournalQueue {
        async fn receive_one(&self) -> Result<Option<QueueMessage>, QueueError> {
            let message = self.inner.receive_one().await?;
            if let Some(m) = &message {
                self.journal.push(format!("receive {}", m.message_id()));
            }
            Ok(message)
        }

        async fn delete(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
            self.journal.push(format!("delete {receipt}"));
            self.inner.delete(receipt).await
        }
    }

    struct JournalLauncher {
        journal: Journal,
    }

    #[async_trait]
    impl CommandLauncher for JournalLauncher {
        async fn launch(&self, command: &DispatchCommand) -> Result<ProcessHandle, LaunchError> {
            let target = command
                .args
                .iter()
                .find(|a| a.starts_with("-e "))
                .cloned()
                .unwrap_or_default();
            self.journal.push(format!("launch {target}"));
            Ok(ProcessHandle { pid: None })
        }
    }

    #[tokio::test]
    async fn messages_are_handled_sequentially_in_receive_order() {
        let journal = Journal::default();
        let queue = Arc::new(JournalQueue {
            inner: InMemoryQueueClient::new(Duration::from_millis(20)),
            journal: journal.clone(),
        });
        queue
            .inner
            .send(message("m1", r#"{"env":"prod","target":"web"}"#, 1_000))
            .await;
        queue
            .inner
            .send(message("m2", r#"{"env":"prod","target":"api"}"#, 1_000))
            .await;

        let config = config(IncompletePayloadPolicy::Discard);
        let poller = Arc::new(
            PollLoopBuilder::new(&config)
                .queue(queue.clone())
                .launcher(Arc::new(JournalLauncher {
                    journal: journal.clone(),
                }))
                .clock(Arc::new(FixedClock::new(now())))
                .build()
                .unwrap(),
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn({
            let poller = poller.clone();
            async move { poller.run(stop_rx).await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.inner.deleted().await.len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        stop_tx.send(true).unwrap();
        let stats = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.dispatched, 2);
        assert_eq!(
            journal.events(),
            vec![
                "receive m1",
                "launch -e env=prod -e target=web",
                "delete rh-m1",
                "receive m2",
                "launch -e env=prod -e target=api",
                "delete rh-m2",
            ]
        );
    }

    #[tokio::test]
    async fn run_survives_receive_errors_and_stops_on_signal() {
        let h = harness(IncompletePayloadPolicy::Discard);
        h.queue.fail_next_receives(2).await;
        h.queue
            .send(message("m1", r#"{"env":"prod","target":"web"}"#, 1_000))
            .await;

        let poller = Arc::new(h.poller);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn({
            let poller = poller.clone();
            async move { poller.run(stop_rx).await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while h.launcher.launch_count() < 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        stop_tx.send(true).unwrap();
        let stats = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(stats.receive_errors, 2);
        assert_eq!(stats.dispatched, 1);
    }

    #[tokio::test]
    async fn run_stops_when_signal_sender_is_dropped() {
        let h = harness(IncompletePayloadPolicy::Discard);
        let (stop_tx, stop_rx) = watch::channel(false);
        drop(stop_tx);

        let stats = tokio::time::timeout(Duration::from_secs(5), h.poller.run(stop_rx))
            .await
            .unwrap();
        assert_eq!(stats.received, 0);
    }
}
