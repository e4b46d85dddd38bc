//! deploy-poll-core
//!
//! Turns deployment-request messages from a durable queue into detached
//! deployment commands, one message at a time.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（message, request, state, errors）
//! - **ports**: 抽象化レイヤー（QueueClient, CommandLauncher, Clock, AutoScalingApi, LoadBalancerApi）
//! - **app**: アプリケーションロジック（validator, staleness, dispatch, poll_loop, builder, lookup）
//! - **impls**: 実装（SQS / AWS 本番用、InMemory 開発・テスト用）
//! - **config**: 起動時に一度だけ作る設定値
//! - **observability**: ループの集計値

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{PollLoop, PollLoopBuilder};
pub use config::DeployPollConfig;
pub use observability::PollStats;
