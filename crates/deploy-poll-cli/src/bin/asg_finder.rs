//! asg-finder - 名前 prefix から現行の autoscaling group を探す
//!
//! 結果は Ansible モジュール形式の JSON で stdout に出す。
//! 0 件なら `changed: false`、2 件以上なら失敗（exit 1）。

use std::process::ExitCode;

use clap::Parser;
use deploy_poll_cli::{AwsArgs, init_tracing};
use deploy_poll_core::app::find_asg;
use deploy_poll_core::impls::{AwsAutoScaling, load_sdk_config};

#[derive(Parser, Debug)]
#[command(author, version, about = "Find the autoscaling group carrying a name prefix", long_about = None)]
struct Cli {
    /// Name prefix of the group
    #[arg(long = "asg-name-prefix")]
    asg_name_prefix: String,

    #[arg(short = 'd', long)]
    debug: bool,

    #[command(flatten)]
    aws: AwsArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let sdk_config = load_sdk_config(&cli.aws.to_config()).await;
    let api = AwsAutoScaling::new(&sdk_config);

    match find_asg(&api, &cli.asg_name_prefix).await {
        Ok(found) => {
            println!("{}", found.to_module_output());
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", err.to_module_output());
            ExitCode::FAILURE
        }
    }
}
