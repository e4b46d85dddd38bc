//! AWS adapters for the lookup ports (Auto Scaling and Classic ELB).

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_elasticloadbalancing::types::Instance;
use aws_sdk_autoscaling::error::DisplayErrorContext;

use crate::ports::{AutoScalingApi, AutoScalingGroup, CloudApiError, InstanceHealth, LoadBalancerApi};

fn convert_group(group: aws_sdk_autoscaling::types::AutoScalingGroup) -> AutoScalingGroup {
    AutoScalingGroup {
        name: group.auto_scaling_group_name.unwrap_or_default(),
        launch_config_name: group.launch_configuration_name,
        health_check_type: group.health_check_type.unwrap_or_default(),
        desired_capacity: group.desired_capacity.unwrap_or_default().max(0) as usize,
        instance_ids: group
            .instances
            .unwrap_or_default()
            .into_iter()
            .filter_map(|i| i.instance_id)
            .collect(),
        load_balancers: group.load_balancer_names.unwrap_or_default(),
    }
}

#[derive(Debug, Clone)]
pub struct AwsAutoScaling {
    client: aws_sdk_autoscaling::Client,
}

impl AwsAutoScaling {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_autoscaling::Client::new(config),
        }
    }
}

#[async_trait]
impl AutoScalingApi for AwsAutoScaling {
    async fn describe_groups(&self) -> Result<Vec<AutoScalingGroup>, CloudApiError> {
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .describe_auto_scaling_groups()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| {
                    CloudApiError::new(
                        "DescribeAutoScalingGroups",
                        DisplayErrorContext(err).to_string(),
                    )
                })?;

            groups.extend(
                output
                    .auto_scaling_groups
                    .unwrap_or_default()
                    .into_iter()
                    .map(convert_group),
            );

            match output.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(groups)
    }

    async fn describe_group(&self, name: &str) -> Result<Option<AutoScalingGroup>, CloudApiError> {
        let output = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(name)
            .send()
            .await
            .map_err(|err| {
                CloudApiError::new(
                    "DescribeAutoScalingGroups",
                    DisplayErrorContext(err).to_string(),
                )
            })?;

        Ok(output
            .auto_scaling_groups
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(convert_group))
    }
}

#[derive(Debug, Clone)]
pub struct AwsLoadBalancing {
    client: aws_sdk_elasticloadbalancing::Client,
}

impl AwsLoadBalancing {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_elasticloadbalancing::Client::new(config),
        }
    }
}

#[async_trait]
impl LoadBalancerApi for AwsLoadBalancing {
    async fn instance_health(
        &self,
        load_balancer: &str,
        instance_ids: &[String],
    ) -> Result<Vec<InstanceHealth>, CloudApiError> {
        let instances = instance_ids
            .iter()
            .map(|id| Instance::builder().instance_id(id).build())
            .collect();

        let output = self
            .client
            .describe_instance_health()
            .load_balancer_name(load_balancer)
            .set_instances(Some(instances))
            .send()
            .await
            .map_err(|err| {
                CloudApiError::new("DescribeInstanceHealth", DisplayErrorContext(err).to_string())
            })?;

        Ok(output
            .instance_states
            .unwrap_or_default()
            .into_iter()
            .map(|s| InstanceHealth {
                instance_id: s.instance_id.unwrap_or_default(),
                state: s.state.unwrap_or_default(),
            })
            .collect())
    }
}
