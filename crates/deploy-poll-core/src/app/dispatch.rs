//! DispatchInvoker - 検証済みリクエストから外部デプロイコマンドを組み立てて起動
//!
//! コマンド形:
//! `<program> --private-key <key> -i <sender_ip>, "-e k1=v1 -e k2=v2" <playbooks_dir>/<playbook>`
//!
//! - inventory は送信元 IP ひとつ + 末尾カンマ（インライン inventory）
//! - 上書き変数は 1 つの引数にまとめる。パラメータが無ければ引数ごと省く
//! - 起動したら待たない。終了コードも見ない

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::domain::{DeployRequest, LaunchError};
use crate::ports::{CommandLauncher, DispatchCommand, ProcessHandle};

pub struct DispatchInvoker {
    launcher: Arc<dyn CommandLauncher>,
    program: String,
    private_key_file: PathBuf,
    playbook_path: PathBuf,
}

impl DispatchInvoker {
    pub fn new(config: &DispatchConfig, launcher: Arc<dyn CommandLauncher>) -> Self {
        Self {
            launcher,
            program: config.program.clone(),
            private_key_file: config.private_key_file.clone(),
            playbook_path: config.playbook_path(),
        }
    }

    pub fn build_command(&self, request: &DeployRequest, sender_ip: &str) -> DispatchCommand {
        let mut command = DispatchCommand::new(&self.program)
            .arg("--private-key")
            .arg(self.private_key_file.to_string_lossy())
            .arg("-i")
            .arg(format!("{sender_ip},"));

        let extra_vars = request
            .overrides()
            .map(|kv| format!("-e {kv}"))
            .collect::<Vec<_>>()
            .join(" ");
        if !extra_vars.is_empty() {
            command = command.arg(extra_vars);
        }

        command.arg(self.playbook_path.to_string_lossy())
    }

    /// Launch the deployment for one host. Returns as soon as the process
    /// has been started.
    pub async fn invoke(
        &self,
        request: &DeployRequest,
        sender_ip: &str,
    ) -> Result<ProcessHandle, LaunchError> {
        info!(
            sender_ip,
            "Deploying {}",
            request.overrides().collect::<Vec<_>>().join(",")
        );

        let command = self.build_command(request, sender_ip);
        debug!(command = %command, "deploy command");

        self.launcher.launch(&command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::RecordingLauncher;
    use std::collections::BTreeMap;

    fn config() -> DispatchConfig {
        DispatchConfig {
            private_key_file: PathBuf::from("/etc/deploy/id_rsa"),
            playbooks_dir: PathBuf::from("/opt/playbooks"),
            ..DispatchConfig::default()
        }
    }

    fn request(pairs: &[(&str, &str)]) -> DeployRequest {
        DeployRequest::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn command_line_shape() {
        let invoker = DispatchInvoker::new(&config(), Arc::new(RecordingLauncher::new()));
        let cmd = invoker.build_command(&request(&[("target", "web"), ("env", "prod")]), "10.0.0.5");

        assert_eq!(cmd.program, "ansible-playbook");
        assert_eq!(
            cmd.args,
            vec![
                "--private-key",
                "/etc/deploy/id_rsa",
                "-i",
                "10.0.0.5,",
                "-e env=prod -e target=web",
                "/opt/playbooks/site.yml",
            ]
        );
    }

    #[test]
    fn empty_request_has_no_override_argument() {
        let invoker = DispatchInvoker::new(&config(), Arc::new(RecordingLauncher::new()));
        let cmd = invoker.build_command(&request(&[]), "10.0.0.9");
        assert_eq!(
            cmd.args,
            vec!["--private-key", "/etc/deploy/id_rsa", "-i", "10.0.0.9,", "/opt/playbooks/site.yml"]
        );
    }

    #[tokio::test]
    async fn invoke_hands_command_to_launcher() {
        let launcher = Arc::new(RecordingLauncher::new());
        let invoker = DispatchInvoker::new(&config(), launcher.clone());

        let handle = invoker
            .invoke(&request(&[("env", "prod")]), "10.0.0.5")
            .await
            .unwrap();

        assert_eq!(handle.pid, Some(1));
        let launched = launcher.launched();
        assert_eq!(launched.len(), 1);
        assert!(launched[0].args.contains(&"-e env=prod".to_string()));
    }

    #[tokio::test]
    async fn launch_failure_is_returned_not_panicked() {
        let invoker = DispatchInvoker::new(&config(), Arc::new(RecordingLauncher::failing()));
        let err = invoker
            .invoke(&request(&[("env", "prod")]), "10.0.0.5")
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }
}
