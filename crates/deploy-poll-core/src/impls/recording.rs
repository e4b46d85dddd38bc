//! RecordingLauncher - 起動せずにコマンドを記録するテスト用 CommandLauncher

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::LaunchError;
use crate::ports::{CommandLauncher, DispatchCommand, ProcessHandle};

#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<DispatchCommand>>,
    fail: bool,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A launcher whose every launch fails (as if the executable were missing).
    pub fn failing() -> Self {
        Self {
            launched: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Commands seen so far, in launch order (failed attempts included).
    pub fn launched(&self) -> Vec<DispatchCommand> {
        self.launched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl CommandLauncher for RecordingLauncher {
    async fn launch(&self, command: &DispatchCommand) -> Result<ProcessHandle, LaunchError> {
        let pid = {
            let mut launched = self.launched.lock().unwrap_or_else(|e| e.into_inner());
            launched.push(command.clone());
            launched.len() as u32
        };

        if self.fail {
            return Err(LaunchError::Spawn {
                program: command.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }

        Ok(ProcessHandle { pid: Some(pid) })
    }
}
