//! Pieces shared by the deploy-poll binaries.

use clap::Args;
use deploy_poll_core::config::AwsConfig;
use tracing_subscriber::EnvFilter;

/// AWS connection flags common to every binary.
#[derive(Args, Debug, Default, Clone)]
pub struct AwsArgs {
    /// AWS region
    #[arg(short = 'r', long)]
    pub region: Option<String>,

    /// Static access key id (default credential chain otherwise)
    #[arg(short = 'k', long = "access-key", requires = "secret_key")]
    pub access_key: Option<String>,

    /// Static secret access key
    #[arg(short = 's', long = "secret-key", requires = "access_key")]
    pub secret_key: Option<String>,

    /// Custom endpoint (e.g. a local SQS emulator)
    #[arg(long)]
    pub endpoint: Option<String>,
}

impl AwsArgs {
    /// Flags win over whatever the config file said.
    pub fn apply(&self, aws: &mut AwsConfig) {
        if let Some(region) = &self.region {
            aws.region = region.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            aws.endpoint = Some(endpoint.clone());
        }
        if let (Some(key), Some(secret)) = (&self.access_key, &self.secret_key) {
            aws.access_key_id = Some(key.clone());
            aws.secret_access_key = Some(secret.clone());
        }
    }

    pub fn to_config(&self) -> AwsConfig {
        let mut aws = AwsConfig::default();
        self.apply(&mut aws);
        aws
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
