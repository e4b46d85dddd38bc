//! Configuration for the poller and the lookup tools.
//!
//! Built once at startup (TOML file, then CLI overrides) and passed by
//! reference into each component's constructor.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::RequiredParameters;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DeployPollConfig {
    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Region and optional static credentials.
///
/// Without static keys the default AWS credential chain is used.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub url: String,

    /// Long-poll window per receive (SQS allows 0..=20).
    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: i32,

    /// Delay after an empty or failed receive.
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    pub visibility_timeout_seconds: Option<i32>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            wait_time_seconds: default_wait_time_seconds(),
            idle_interval_ms: default_idle_interval_ms(),
            visibility_timeout_seconds: None,
        }
    }
}

const fn default_wait_time_seconds() -> i32 {
    20
}

const fn default_idle_interval_ms() -> u64 {
    1000
}

/// What to do with a message that lacks a required parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncompletePayloadPolicy {
    /// Delete it like every other permanent validation failure.
    #[default]
    Discard,

    /// Leave it on the queue (unless stale) so it comes back after the
    /// visibility lease expires.
    Redeliver,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default)]
    pub private_key_file: PathBuf,

    #[serde(default)]
    pub playbooks_dir: PathBuf,

    #[serde(default = "default_playbook")]
    pub playbook: String,

    #[serde(default)]
    pub required_parameters: RequiredParameters,

    #[serde(default)]
    pub incomplete_payload: IncompletePayloadPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            private_key_file: PathBuf::new(),
            playbooks_dir: PathBuf::new(),
            playbook: default_playbook(),
            required_parameters: RequiredParameters::default(),
            incomplete_payload: IncompletePayloadPolicy::default(),
        }
    }
}

impl DispatchConfig {
    pub fn playbook_path(&self) -> PathBuf {
        self.playbooks_dir.join(&self.playbook)
    }
}

fn default_program() -> String {
    "ansible-playbook".to_owned()
}

fn default_playbook() -> String {
    "site.yml".to_owned()
}

impl DeployPollConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Reject settings the poller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.url.trim().is_empty() {
            return Err(ConfigError::Invalid("queue.url is required".into()));
        }
        if !(0..=20).contains(&self.queue.wait_time_seconds) {
            return Err(ConfigError::Invalid(format!(
                "queue.wait_time_seconds must be within 0..=20, got {}",
                self.queue.wait_time_seconds
            )));
        }
        if self.dispatch.program.trim().is_empty() {
            return Err(ConfigError::Invalid("dispatch.program is empty".into()));
        }
        if self.dispatch.private_key_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "dispatch.private_key_file is required".into(),
            ));
        }
        if self.dispatch.playbooks_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "dispatch.playbooks_dir is required".into(),
            ));
        }
        let required = &self.dispatch.required_parameters;
        if required.names().iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "dispatch.required_parameters contains an empty name".into(),
            ));
        }
        let dups = required.duplicates();
        if !dups.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "dispatch.required_parameters lists {dups:?} more than once"
            )));
        }
        Ok(())
    }
}
