//! PollLoopBuilder - PollLoop の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 設定値は一度だけ作り、参照で各コンポーネントに渡す

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigError, DeployPollConfig};
use crate::impls::DetachedLauncher;
use crate::ports::{Clock, CommandLauncher, QueueClient, SystemClock};

use super::{DispatchInvoker, MessageValidator, PollLoop, StalenessFilter};

/// PollLoopBuilder は PollLoop を構築
///
/// # 使用例
/// ```ignore
/// let poller = PollLoopBuilder::new(&config)
///     .queue(Arc::new(sqs))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に設定を validate() する
/// - queue は必須、launcher / clock は本番用の既定値
pub struct PollLoopBuilder<'a> {
    config: &'a DeployPollConfig,
    queue: Option<Arc<dyn QueueClient>>,
    launcher: Option<Arc<dyn CommandLauncher>>,
    clock: Option<Arc<dyn Clock>>,
}

/// BuildError は PollLoop 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no queue client was provided")]
    MissingQueue,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl<'a> PollLoopBuilder<'a> {
    pub fn new(config: &'a DeployPollConfig) -> Self {
        Self {
            config,
            queue: None,
            launcher: None,
            clock: None,
        }
    }

    pub fn queue(mut self, queue: Arc<dyn QueueClient>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// 既定: DetachedLauncher
    pub fn launcher(mut self, launcher: Arc<dyn CommandLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// 既定: SystemClock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<PollLoop, BuildError> {
        self.config.validate()?;

        let queue = self.queue.ok_or(BuildError::MissingQueue)?;
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(DetachedLauncher::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let dispatch = &self.config.dispatch;
        Ok(PollLoop::new(
            queue,
            MessageValidator::from_config(dispatch),
            StalenessFilter::new(clock),
            DispatchInvoker::new(dispatch, launcher),
            dispatch.incomplete_payload,
            Duration::from_millis(self.config.queue.idle_interval_ms),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryQueueClient, RecordingLauncher};

    fn config() -> DeployPollConfig {
        DeployPollConfig::from_toml(
            r#"
            [queue]
            url = "memory://deploys"

            [dispatch]
            private_key_file = "/etc/deploy/id_rsa"
            playbooks_dir = "/opt/playbooks"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_success() {
        let config = config();
        let poller = PollLoopBuilder::new(&config)
            .queue(Arc::new(InMemoryQueueClient::default()))
            .launcher(Arc::new(RecordingLauncher::new()))
            .build();
        assert!(poller.is_ok());
    }

    #[test]
    fn test_build_missing_queue() {
        let config = config();
        let poller = PollLoopBuilder::new(&config).build();
        assert!(matches!(poller, Err(BuildError::MissingQueue)));
    }

    #[test]
    fn test_build_invalid_config() {
        let mut config = config();
        config.queue.url.clear();
        let poller = PollLoopBuilder::new(&config)
            .queue(Arc::new(InMemoryQueueClient::default()))
            .build();
        assert!(matches!(poller, Err(BuildError::Config(_))));
    }
}
