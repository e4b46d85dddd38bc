//! Cloud lookup ports - Auto Scaling / Classic ELB の読み取り専用 API
//!
//! `asg-finder` と `elb-health-check` が使う。状態は持たない。

use async_trait::async_trait;
use thiserror::Error;

/// The subset of an autoscaling group the lookups look at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutoScalingGroup {
    pub name: String,
    pub launch_config_name: Option<String>,
    /// `"EC2"` or `"ELB"`.
    pub health_check_type: String,
    pub desired_capacity: usize,
    pub instance_ids: Vec<String>,
    pub load_balancers: Vec<String>,
}

/// Health of one instance as reported by one load balancer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHealth {
    pub instance_id: String,
    /// `"InService"`, `"OutOfService"`, `"Unknown"`.
    pub state: String,
}

impl InstanceHealth {
    pub fn in_service(&self) -> bool {
        self.state == "InService"
    }
}

#[derive(Debug, Error)]
#[error("{operation} failed: {message}")]
pub struct CloudApiError {
    pub operation: &'static str,
    pub message: String,
}

impl CloudApiError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait AutoScalingApi: Send + Sync {
    /// Every group in the region.
    async fn describe_groups(&self) -> Result<Vec<AutoScalingGroup>, CloudApiError>;

    /// One group by exact name.
    async fn describe_group(&self, name: &str) -> Result<Option<AutoScalingGroup>, CloudApiError>;
}

#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    async fn instance_health(
        &self,
        load_balancer: &str,
        instance_ids: &[String],
    ) -> Result<Vec<InstanceHealth>, CloudApiError>;
}
