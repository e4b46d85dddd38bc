//! SqsQueueClient - Amazon SQS 上の QueueClient 実装

use std::fmt;

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::operation::delete_message::DeleteMessageError;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName, QueueAttributeName};
use tracing::debug;

use super::aws::load_sdk_config;
use crate::config::{AwsConfig, QueueConfig};
use crate::domain::{QueueError, QueueMessage, ReceiptHandle, SENDER_IP_ATTRIBUTE};
use crate::ports::QueueClient;

fn sdk_message(err: impl std::error::Error) -> String {
    DisplayErrorContext(err).to_string()
}

/// Project an SDK message onto the fields the core reads.
fn into_queue_message(message: Message) -> Result<QueueMessage, QueueError> {
    let Some(receipt) = message.receipt_handle else {
        return Err(QueueError::Receive(
            "message delivered without a receipt handle".into(),
        ));
    };

    let mut received = QueueMessage::new(
        message.message_id.unwrap_or_default(),
        ReceiptHandle::new(receipt),
        message.body.unwrap_or_default(),
    );

    if let Some(ts) = message
        .attributes
        .as_ref()
        .and_then(|attrs| attrs.get(&MessageSystemAttributeName::SentTimestamp))
    {
        received = received.with_sent_timestamp(ts.clone());
    }

    if let Some(ip) = message
        .message_attributes
        .as_ref()
        .and_then(|attrs| attrs.get(SENDER_IP_ATTRIBUTE))
        .and_then(|value| value.string_value.clone())
    {
        received = received.with_sender_ip(ip);
    }

    Ok(received)
}

/// The handle was already used or its lease ran out.
fn receipt_rejected(err: &DeleteMessageError) -> bool {
    err.is_receipt_handle_is_invalid() || err.is_invalid_id_format()
}

#[derive(Clone)]
pub struct SqsQueueClient {
    client: Client,
    queue_url: String,
    wait_time_seconds: i32,
    visibility_timeout_seconds: Option<i32>,
}

impl fmt::Debug for SqsQueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsQueueClient")
            .field("queue_url", &self.queue_url)
            .field("wait_time_seconds", &self.wait_time_seconds)
            .finish_non_exhaustive()
    }
}

impl SqsQueueClient {
    /// Open the session and prove it works.
    ///
    /// One authenticated `GetQueueAttributes` call is made so bad credentials
    /// or a wrong region surface here as `QueueError::Connection` instead of
    /// as an endless stream of receive failures.
    pub async fn connect(aws: &AwsConfig, queue: &QueueConfig) -> Result<Self, QueueError> {
        let shared_config = load_sdk_config(aws).await;
        let client = Client::new(&shared_config);

        client
            .get_queue_attributes()
            .queue_url(&queue.url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(|err| QueueError::Connection {
                queue: queue.url.clone(),
                message: sdk_message(err),
            })?;

        debug!(queue_url = %queue.url, region = %aws.region, "queue session established");

        Ok(Self {
            client,
            queue_url: queue.url.clone(),
            wait_time_seconds: queue.wait_time_seconds,
            visibility_timeout_seconds: queue.visibility_timeout_seconds,
        })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn receive_one(&self) -> Result<Option<QueueMessage>, QueueError> {
        let mut request = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.wait_time_seconds)
            .message_system_attribute_names(MessageSystemAttributeName::SentTimestamp)
            .message_attribute_names(SENDER_IP_ATTRIBUTE);

        if let Some(timeout) = self.visibility_timeout_seconds {
            request = request.visibility_timeout(timeout);
        }

        let output = request
            .send()
            .await
            .map_err(|err| QueueError::Receive(sdk_message(err)))?;

        match output.messages.unwrap_or_default().into_iter().next() {
            Some(message) => into_queue_message(message).map(Some),
            None => Ok(None),
        }
    }

    async fn delete(&self, receipt: &ReceiptHandle) -> Result<(), QueueError> {
        let result = self
            .client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt.as_str())
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                if err.as_service_error().is_some_and(receipt_rejected) {
                    Err(QueueError::ReceiptExpired(receipt.to_string()))
                } else {
                    Err(QueueError::Delete(sdk_message(err)))
                }
            }
        }
    }
}
