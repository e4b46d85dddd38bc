//! Read-only cloud lookups used around deployments.
//!
//! - `find_asg`: which autoscaling group currently carries a name prefix
//! - `check_elb_health`: is a group fully in service behind its ELBs

use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::ports::{AutoScalingApi, CloudApiError, LoadBalancerApi};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("More than one ASG with prefix={prefix} found. manual intervention required!")]
    Ambiguous { prefix: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Precondition(String),

    #[error(transparent)]
    Api(#[from] CloudApiError),
}

impl LookupError {
    /// Ansible-module style failure document.
    pub fn to_module_output(&self) -> serde_json::Value {
        json!({ "failed": true, "msg": self.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsgLookup {
    Found {
        asg_name: String,
        launch_config_name: Option<String>,
    },
    /// No group carries the prefix.
    Unchanged,
}

impl AsgLookup {
    /// Ansible-module style result document.
    pub fn to_module_output(&self) -> serde_json::Value {
        match self {
            AsgLookup::Found {
                asg_name,
                launch_config_name,
            } => json!({
                "changed": true,
                "rc": 0,
                "ansible_facts": {
                    "current_asg_name": asg_name,
                    "current_lc_name": launch_config_name,
                }
            }),
            AsgLookup::Unchanged => json!({ "changed": false, "rc": 0 }),
        }
    }
}

pub async fn find_asg(api: &dyn AutoScalingApi, prefix: &str) -> Result<AsgLookup, LookupError> {
    let mut matches: Vec<_> = api
        .describe_groups()
        .await?
        .into_iter()
        .filter(|g| g.name.starts_with(prefix))
        .collect();

    debug!(prefix, matches = matches.len(), "autoscaling groups matched");

    if matches.len() > 1 {
        return Err(LookupError::Ambiguous {
            prefix: prefix.to_string(),
        });
    }

    Ok(match matches.pop() {
        Some(group) => AsgLookup::Found {
            asg_name: group.name,
            launch_config_name: group.launch_config_name,
        },
        None => AsgLookup::Unchanged,
    })
}

pub async fn check_elb_health(
    asg_api: &dyn AutoScalingApi,
    elb_api: &dyn LoadBalancerApi,
    group_name: &str,
) -> Result<(), LookupError> {
    let group = asg_api
        .describe_group(group_name)
        .await?
        .ok_or_else(|| LookupError::NotFound("ASG not found".into()))?;

    if group.health_check_type != "ELB" {
        return Err(LookupError::Precondition(
            "ASG does not use ELB health checks. Quitting.".into(),
        ));
    }

    if group.instance_ids.len() != group.desired_capacity {
        return Err(LookupError::Precondition(
            "Number of instances do not yet match desired capacity".into(),
        ));
    }

    for lb in &group.load_balancers {
        for health in elb_api.instance_health(lb, &group.instance_ids).await? {
            if !health.in_service() {
                return Err(LookupError::Precondition(format!(
                    "Instance {} is not InService",
                    health.instance_id
                )));
            }
        }
    }

    Ok(())
}
