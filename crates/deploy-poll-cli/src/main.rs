//! run-deploy-poll - デプロイ要求キューを監視し続けるポーラー
//!
//! 設定ファイル（任意）→ CLI フラグで上書き → validate → SQS 接続確認 → ループ。
//! SIGINT / SIGTERM で受信待ちを打ち切り、処理中の 1 件を終えてから止まる。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use deploy_poll_cli::{AwsArgs, init_tracing};
use deploy_poll_core::config::{DeployPollConfig, IncompletePayloadPolicy};
use deploy_poll_core::impls::SqsQueueClient;
use deploy_poll_core::PollLoopBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Poll a queue for deployment requests and launch them", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Queue URL to poll
    #[arg(short = 'q', long = "queue-url")]
    queue_url: Option<String>,

    /// Seconds to wait after an empty or failed receive
    #[arg(short = 'i', long)]
    interval: Option<u64>,

    /// Private key handed to the deployment tool
    #[arg(short = 'p', long = "private-key")]
    private_key: Option<PathBuf>,

    /// Directory holding the playbooks
    #[arg(long = "playbooks-dir")]
    playbooks_dir: Option<PathBuf>,

    /// Leave messages missing a required parameter on the queue
    #[arg(long)]
    redeliver_incomplete: bool,

    /// Verbose logging
    #[arg(short = 'd', long)]
    debug: bool,

    #[command(flatten)]
    aws: AwsArgs,
}

impl Cli {
    fn into_config(self) -> Result<DeployPollConfig> {
        let mut config = match &self.config {
            Some(path) => DeployPollConfig::load(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => DeployPollConfig::default(),
        };

        self.aws.apply(&mut config.aws);
        if let Some(url) = self.queue_url {
            config.queue.url = url;
        }
        if let Some(secs) = self.interval {
            config.queue.idle_interval_ms = secs.saturating_mul(1000);
        }
        if let Some(key) = self.private_key {
            config.dispatch.private_key_file = key;
        }
        if let Some(dir) = self.playbooks_dir {
            config.dispatch.playbooks_dir = dir;
        }
        if self.redeliver_incomplete {
            config.dispatch.incomplete_payload = IncompletePayloadPolicy::Redeliver;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = cli.into_config()?;

    let queue = match SqsQueueClient::connect(&config.aws, &config.queue).await {
        Ok(queue) => queue,
        Err(err) => {
            error!(error = %err, "unable to open queue session");
            return Err(err.into());
        }
    };
    info!(queue = queue.queue_url(), "connected");

    let poller = PollLoopBuilder::new(&config)
        .queue(Arc::new(queue))
        .build()
        .context("failed to assemble poll loop")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let stats = poller.run(stop_rx).await;
    info!(
        received = stats.received,
        dispatched = stats.dispatched,
        dispatch_failures = stats.dispatch_failures,
        discarded = stats.discarded,
        left_for_redelivery = stats.left_for_redelivery,
        receive_errors = stats.receive_errors,
        delete_failures = stats.delete_failures,
        rejections = ?stats.rejections,
        "shutdown complete"
    );

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("stop requested, finishing current message");
}
