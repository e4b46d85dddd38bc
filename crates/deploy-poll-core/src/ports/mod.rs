//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（SQS, 子プロセス, AWS API, 時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod cloud;
pub mod launcher;
pub mod queue_client;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::cloud::{AutoScalingApi, AutoScalingGroup, CloudApiError, InstanceHealth, LoadBalancerApi};
pub use self::launcher::{CommandLauncher, DispatchCommand, ProcessHandle};
pub use self::queue_client::QueueClient;
