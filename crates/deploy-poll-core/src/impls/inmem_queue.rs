//! InMemoryQueueClient - 開発・テスト用の QueueClient
//!
//! # 学習ポイント
//! - Mutex + Notify による「待てる」receive（long-poll の再現）
//! - visibility lease の再現: 受信済みで未削除のメッセージは in_flight に残り、
//!   `expire_leases()` で ready に戻る

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::{QueueError, QueueMessage, ReceiptHandle};
use crate::ports::QueueClient;

#[derive(Default)]
struct InMemoryQueueState {
    /// Visible messages, oldest first.
    ready: VecDeque<QueueMessage>,

    /// Received but not yet deleted.
    in_flight: HashMap<ReceiptHandle, QueueMessage>,

    /// Handles that were actually removed, in deletion order.
    deleted: Vec<ReceiptHandle>,

    /// Every `delete` call per handle, including no-ops.
    delete_calls: HashMap<ReceiptHandle, usize>,

    /// Receipts handed out, in order.
    received: Vec<ReceiptHandle>,

    /// Upcoming `receive_one` calls that should fail.
    failing_receives: usize,
}

/// In-memory queue with lease semantics.
///
/// # 使用例
/// ```ignore
/// let queue = InMemoryQueueClient::new(Duration::from_millis(50));
/// queue.send(message).await;
/// let msg = queue.receive_one().await?;
/// ```
pub struct InMemoryQueueClient {
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
    /// Stand-in for the SQS long-poll window.
    wait: Duration,
}

impl InMemoryQueueClient {
    pub fn new(wait: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryQueueState::default())),
            notify: Arc::new(Notify::new()),
            wait,
        }
    }

    /// Enqueue a message (the upstream enqueuer's job in production).
    pub async fn send(&self, message: QueueMessage) {
        self.state.lock().await.ready.push_back(message);
        self.notify.notify_one();
    }

    /// Simulate every outstanding visibility lease running out.
    pub async fn expire_leases(&self) -> usize {
        let mut state = self.state.lock().await;
        let expired: Vec<QueueMessage> = state.in_flight.drain().map(|(_, m)| m).collect();
        let n = expired.len();
        state.ready.extend(expired);
        drop(state);
        if n > 0 {
            self.notify.notify_one();
        }
        n
    }

    /// Make the next `n` receives fail with `QueueError::Receive`.
    pub async fn fail_next_receives(&self, n: usize) {
        self.state.lock().await.failing_receives = n;
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub async fn deleted(&self) -> Vec<ReceiptHandle> {
        self.state.lock().await.deleted.clone()
    }

    pub async fn delete_calls(&self, receipt: &ReceiptHandle) -> usize {
        self.state
            .lock()
            .await
            .delete_calls
            .get(receipt)
            .copied()
            .unwrap_or(0)
    }

    pub async fn received(&self) -> Vec<ReceiptHandle> {
        self.state.lock().await.received.clone()
    }
}

impl Default for InMemoryQueueClient {
    fn default() -> Self {
        Self::new(Duration::from_millis(20))
    }
}

#[async_trait]
impl QueueClient for InMemoryQueueClient {
    async fn receive_one(&self) -> Result<Option<QueueMessage>, QueueError> {
        let deadline = Instant::now() + self.wait;
        loop {
            // 先に notified() を作ってから確認する（send との競合で取りこぼさない）
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if state.failing_receives > 0 {
                    state.failing_receives -= 1;
                    return Err(QueueError::Receive("injected receive failure".into()));
                }
                if let Some(message) = state.ready.pop_front() {
                    let receipt = message.receipt_handle().clone();
                    state.received.push(receipt.clone());
                    state.in_flight.insert(receipt, message.clone());
                    return Ok(Some(message));
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    /// Unknown or already-deleted handles are a no-op success.
    async fn delete(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        *state.delete_calls.entry(receipt.clone()).or_default() += 1;
        if state.in_flight.remove(receipt).is_some() {
            state.deleted.push(receipt.clone());
        }
        Ok(())
    }
}
