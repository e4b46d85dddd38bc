//! Errors - エラー型と分類
//!
//! - `Rejection`: 1 メッセージ単位の検証失敗（ループ内で回復する）
//! - `QueueError`: キュー操作の失敗（`Connection` のみ起動時に致命的）
//! - `LaunchError`: 外部コマンド起動の失敗（ログのみ、ループは継続）

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a message was not dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("message has no SentTimestamp attribute")]
    MissingTimestamp,

    #[error("SentTimestamp {0:?} is not an epoch-milliseconds integer")]
    InvalidTimestamp(String),

    #[error("message missing SenderIp attribute")]
    MissingSender,

    #[error("unable to deserialize JSON body: {0}")]
    MalformedBody(String),

    /// Carries `sent_at` so the redelivery policy can still tell stale
    /// messages apart.
    #[error("message missing required parameter {name}")]
    MissingParameter { name: String, sent_at: DateTime<Utc> },

    #[error("message is older than {threshold_secs} seconds (age {age_ms}ms)")]
    Stale { age_ms: i64, threshold_secs: i64 },
}

impl Rejection {
    /// Short label used in logs and counters.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::MissingTimestamp | Rejection::InvalidTimestamp(_) => "bad_timestamp",
            Rejection::MissingSender => "missing_sender",
            Rejection::MalformedBody(_) => "malformed_body",
            Rejection::MissingParameter { .. } => "incomplete_payload",
            Rejection::Stale { .. } => "stale",
        }
    }

    pub fn is_incomplete_payload(&self) -> bool {
        matches!(self, Rejection::MissingParameter { .. })
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    /// Session could not be established. Fatal at startup.
    #[error("unable to connect to queue {queue}: {message}")]
    Connection { queue: String, message: String },

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("delete failed: {0}")]
    Delete(String),

    /// Handle already deleted or its lease expired.
    #[error("receipt handle is no longer valid: {0}")]
    ReceiptExpired(String),
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
