//! QueueClient port - 耐久キュー（SQS など）への受信・削除
//!
//! # 設計原則
//! - 1 回の `receive_one` で高々 1 メッセージ
//! - 待ち時間はキュー側の long-poll に任せる
//! - `delete` は冪等（削除済み・期限切れ handle でも呼び出し側を落とさない）

use async_trait::async_trait;

use crate::domain::{QueueError, QueueMessage, ReceiptHandle};

#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Wait (bounded by the queue's polling window) for at most one message.
    ///
    /// `Ok(None)` means nothing arrived within the window.
    async fn receive_one(&self) -> Result<Option<QueueMessage>, QueueError>;

    /// Acknowledge a message so it is never redelivered.
    async fn delete(&self, receipt: &ReceiptHandle) -> Result<(), QueueError>;
}
