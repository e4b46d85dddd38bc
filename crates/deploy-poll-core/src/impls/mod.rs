//! Impls - ports の実装
//!
//! # 本番用実装
//! - **SqsQueueClient**: Amazon SQS
//! - **DetachedLauncher**: tokio::process による fire-and-forget 起動
//! - **AwsAutoScaling / AwsLoadBalancing**: lookup ツール用
//!
//! # 開発用・テスト用実装
//! - **InMemoryQueueClient**: visibility lease を再現するキュー
//! - **RecordingLauncher**: 起動せずに記録するだけ
//! - **InMemoryCloud**: Auto Scaling / ELB のフェイク

pub mod aws;
pub mod aws_cloud;
pub mod inmem_cloud;
pub mod inmem_queue;
pub mod process;
pub mod recording;
pub mod sqs;

pub use self::aws::load_sdk_config;
pub use self::aws_cloud::{AwsAutoScaling, AwsLoadBalancing};
pub use self::inmem_cloud::InMemoryCloud;
pub use self::inmem_queue::InMemoryQueueClient;
pub use self::process::DetachedLauncher;
pub use self::recording::RecordingLauncher;
pub use self::sqs::SqsQueueClient;
