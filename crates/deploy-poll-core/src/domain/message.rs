//! Inbound queue message as handed over by the broker.
//!
//! The core only reads these fields; ownership of the underlying message
//! (and its visibility lease) stays with the queue service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message attribute identifying the host that asked to be deployed.
pub const SENDER_IP_ATTRIBUTE: &str = "SenderIp";

/// Opaque token required to acknowledge (delete) a received message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single delivery of a queue message.
///
/// Attributes are kept raw (as the broker delivered them); parsing and
/// checking them is the validator's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    message_id: String,
    receipt_handle: ReceiptHandle,
    sent_timestamp: Option<String>,
    sender_ip: Option<String>,
    body: String,
}

impl QueueMessage {
    pub fn new(
        message_id: impl Into<String>,
        receipt_handle: ReceiptHandle,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            receipt_handle,
            sent_timestamp: None,
            sender_ip: None,
            body: body.into(),
        }
    }

    /// Set the raw `SentTimestamp` attribute.
    pub fn with_sent_timestamp(mut self, raw: impl Into<String>) -> Self {
        self.sent_timestamp = Some(raw.into());
        self
    }

    /// Set the `SenderIp` message attribute.
    pub fn with_sender_ip(mut self, ip: impl Into<String>) -> Self {
        self.sender_ip = Some(ip.into());
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn receipt_handle(&self) -> &ReceiptHandle {
        &self.receipt_handle
    }

    pub fn sent_timestamp(&self) -> Option<&str> {
        self.sent_timestamp.as_deref()
    }

    pub fn sender_ip(&self) -> Option<&str> {
        self.sender_ip.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
