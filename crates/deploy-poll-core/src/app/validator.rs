//! MessageValidator - 生メッセージから DeployRequest を取り出す
//!
//! # 検証順（それぞれ独立に失敗しうる）
//! 1. SentTimestamp を epoch ミリ秒として解釈
//! 2. SenderIp メッセージ属性を取り出す
//! 3. body を JSON オブジェクトとしてデシリアライズ
//! 4. 必須パラメータが全て揃っているか確認
//!
//! staleness 判定は次段（StalenessFilter）に任せる。

use chrono::{DateTime, Utc};

use crate::config::DispatchConfig;
use crate::domain::{DeployRequest, QueueMessage, Rejection, RequiredParameters, ValidatedMessage};

#[derive(Debug, Clone)]
pub struct MessageValidator {
    required: RequiredParameters,
}

impl MessageValidator {
    pub fn new(required: RequiredParameters) -> Self {
        Self { required }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.required_parameters.clone())
    }

    pub fn validate(&self, message: &QueueMessage) -> Result<ValidatedMessage, Rejection> {
        let sent_at = parse_sent_timestamp(message.sent_timestamp())?;

        let sender_ip = match message.sender_ip().map(str::trim) {
            Some(ip) if !ip.is_empty() => ip.to_string(),
            _ => return Err(Rejection::MissingSender),
        };

        let object = match serde_json::from_str::<serde_json::Value>(message.body()) {
            Ok(serde_json::Value::Object(object)) => object,
            Ok(other) => {
                return Err(Rejection::MalformedBody(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )));
            }
            Err(err) => return Err(Rejection::MalformedBody(err.to_string())),
        };

        let request = DeployRequest::from_json_object(object);
        if let Some(name) = self.required.first_missing(request.parameters()) {
            return Err(Rejection::MissingParameter {
                name: name.to_string(),
                sent_at,
            });
        }

        Ok(ValidatedMessage {
            request,
            sender_ip,
            sent_at,
        })
    }
}

/// Epoch milliseconds, as SQS delivers `SentTimestamp`.
pub fn parse_sent_timestamp(raw: Option<&str>) -> Result<DateTime<Utc>, Rejection> {
    let raw = raw.ok_or(Rejection::MissingTimestamp)?;
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Rejection::InvalidTimestamp(raw.to_string()))?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| Rejection::InvalidTimestamp(raw.to_string()))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
