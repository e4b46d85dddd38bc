//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **MessageValidator**: 属性と body の検証
//! - **StalenessFilter**: 60 秒より古い要求を捨てる
//! - **DispatchInvoker**: デプロイコマンドの組み立てと起動
//! - **PollLoop**: receive → validate → dispatch → delete のループ
//! - **PollLoopBuilder**: 構築とワイヤリング
//! - **lookup**: ASG / ELB の読み取り専用ツール

pub mod builder;
pub mod dispatch;
pub mod lookup;
pub mod poll_loop;
pub mod staleness;
pub mod validator;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, PollLoopBuilder};
pub use self::dispatch::DispatchInvoker;
pub use self::lookup::{AsgLookup, LookupError, check_elb_health, find_asg};
pub use self::poll_loop::PollLoop;
pub use self::staleness::{FRESHNESS_THRESHOLD_SECS, StalenessFilter};
pub use self::validator::MessageValidator;
