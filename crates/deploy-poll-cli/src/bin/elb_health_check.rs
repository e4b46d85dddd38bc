//! elb-health-check - ASG 配下の全インスタンスが ELB で InService か確認する

use std::process::ExitCode;

use clap::{CommandFactory, FromArgMatches, Parser};
use deploy_poll_cli::{AwsArgs, init_tracing};
use deploy_poll_core::app::check_elb_health;
use deploy_poll_core::impls::{AwsAutoScaling, AwsLoadBalancing, load_sdk_config};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Check that an autoscaling group is fully InService", long_about = None)]
struct Cli {
    /// Autoscaling group name
    #[arg(short = 'a', long = "autoscale-group")]
    autoscale_group: String,

    #[arg(short = 'd', long)]
    debug: bool,

    #[command(flatten)]
    aws: AwsArgs,
}

/// Region has no default here: a health check against the wrong region
/// would report a missing group instead of failing loudly.
fn command() -> clap::Command {
    Cli::command().mut_arg("region", |arg| arg.required(true))
}

fn parse_cli() -> Cli {
    let matches = command().get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = parse_cli();
    init_tracing(cli.debug);

    let sdk_config = load_sdk_config(&cli.aws.to_config()).await;
    let asg_api = AwsAutoScaling::new(&sdk_config);
    let elb_api = AwsLoadBalancing::new(&sdk_config);

    match check_elb_health(&asg_api, &elb_api, &cli.autoscale_group).await {
        Ok(()) => {
            info!(group = %cli.autoscale_group, "all instances InService");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
