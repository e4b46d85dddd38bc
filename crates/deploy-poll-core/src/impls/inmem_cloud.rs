//! InMemoryCloud - テスト用の Auto Scaling / ELB フェイク

use std::collections::HashMap;

use async_trait::async_trait;

use crate::ports::{AutoScalingApi, AutoScalingGroup, CloudApiError, InstanceHealth, LoadBalancerApi};

#[derive(Debug, Default, Clone)]
pub struct InMemoryCloud {
    groups: Vec<AutoScalingGroup>,
    /// (load balancer, instance id) -> state
    health: HashMap<(String, String), String>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: AutoScalingGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_health(
        mut self,
        load_balancer: impl Into<String>,
        instance_id: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        self.health
            .insert((load_balancer.into(), instance_id.into()), state.into());
        self
    }
}

#[async_trait]
impl AutoScalingApi for InMemoryCloud {
    async fn describe_groups(&self) -> Result<Vec<AutoScalingGroup>, CloudApiError> {
        Ok(self.groups.clone())
    }

    async fn describe_group(&self, name: &str) -> Result<Option<AutoScalingGroup>, CloudApiError> {
        Ok(self.groups.iter().find(|g| g.name == name).cloned())
    }
}

#[async_trait]
impl LoadBalancerApi for InMemoryCloud {
    /// Instances the load balancer has never heard of report `"Unknown"`.
    async fn instance_health(
        &self,
        load_balancer: &str,
        instance_ids: &[String],
    ) -> Result<Vec<InstanceHealth>, CloudApiError> {
        Ok(instance_ids
            .iter()
            .map(|id| InstanceHealth {
                instance_id: id.clone(),
                state: self
                    .health
                    .get(&(load_balancer.to_string(), id.clone()))
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
            })
            .collect())
    }
}
