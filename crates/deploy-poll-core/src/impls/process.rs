//! DetachedLauncher - 子プロセスを起動して即座に手放す CommandLauncher
//!
//! `tokio::process::Child` は drop しても kill されない（kill_on_drop = false）。
//! 終了した子プロセスは tokio ランタイムがバックグラウンドで回収する。

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::LaunchError;
use crate::ports::{CommandLauncher, DispatchCommand, ProcessHandle};

/// Spawns the command with inherited stdout/stderr and never waits on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedLauncher;

impl DetachedLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandLauncher for DetachedLauncher {
    async fn launch(&self, command: &DispatchCommand) -> Result<ProcessHandle, LaunchError> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        Ok(ProcessHandle { pid: child.id() })
    }
}
