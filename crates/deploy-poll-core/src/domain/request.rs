//! DeployRequest - 検証済みのデプロイ要求
//!
//! # 学習ポイント
//! - 境界で一度だけ検証し、以降は型で保証する（required key contract）
//! - `serde_json::Map` から `BTreeMap<String, String>` への射影

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parameter names every deploy request body must carry.
///
/// Names are unique; order only matters for which missing name gets reported
/// first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredParameters(Vec<String>);

impl RequiredParameters {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// First required name absent from `body`, if any.
    pub fn first_missing<'a, V>(&'a self, body: &BTreeMap<String, V>) -> Option<&'a str> {
        self.0
            .iter()
            .find(|name| !body.contains_key(name.as_str()))
            .map(String::as_str)
    }

    /// Names listed more than once.
    pub fn duplicates(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut dups = BTreeSet::new();
        for name in &self.0 {
            if !seen.insert(name.as_str()) {
                dups.insert(name.clone());
            }
        }
        dups.into_iter().collect()
    }
}

impl Default for RequiredParameters {
    fn default() -> Self {
        Self::new(["env", "target"])
    }
}

/// Typed projection of a message body.
///
/// Values are flattened to strings because they end up as `key=value`
/// overrides on a command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    parameters: BTreeMap<String, String>,
}

impl DeployRequest {
    pub fn new(parameters: BTreeMap<String, String>) -> Self {
        Self { parameters }
    }

    /// Build from a decoded JSON object.
    ///
    /// - strings are taken verbatim
    /// - `null` becomes the empty string
    /// - everything else uses its compact JSON text
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        let parameters = object
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect();
        Self { parameters }
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// `key=value` pairs in key order.
    pub fn overrides(&self) -> impl Iterator<Item = String> + '_ {
        self.parameters.iter().map(|(k, v)| format!("{k}={v}"))
    }
}

/// Output of the validator: everything the later stages need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMessage {
    pub request: DeployRequest,
    pub sender_ip: String,
    pub sent_at: DateTime<Utc>,
}
