//! CommandLauncher port - 外部コマンドの fire-and-forget 起動
//!
//! コアは具体的な process spawn ではなくこの trait に依存します。
//! テストでは `RecordingLauncher` に差し替えます。

use std::fmt;

use async_trait::async_trait;

use crate::domain::LaunchError;

/// A fully built command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl DispatchCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for DispatchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// What is left of a launched process. Never awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessHandle {
    pub pid: Option<u32>,
}

#[async_trait]
pub trait CommandLauncher: Send + Sync {
    /// Start `command` detached and return immediately.
    async fn launch(&self, command: &DispatchCommand) -> Result<ProcessHandle, LaunchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let cmd = DispatchCommand::new("ansible-playbook")
            .arg("-i")
            .arg("10.0.0.5,");
        assert_eq!(cmd.to_string(), "ansible-playbook -i 10.0.0.5,");
    }
}
