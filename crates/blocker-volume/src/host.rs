//! Local OS collaborators: process execution and device node probing

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::process::Command;
use tracing::trace;

/// Outcome of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the command exited successfully
    pub success: bool,
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Combined stdout and stderr
    pub output: String,
}

impl CommandOutput {
    /// Successful run with the given output
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            output: output.into(),
        }
    }

    /// Failed run with an exit code and output
    pub fn failed(code: i32, output: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            output: output.into(),
        }
    }

    /// Human-readable exit status
    #[must_use]
    pub fn status(&self) -> String {
        match self.code {
            Some(code) => format!("exit status: {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external commands such as `mount` and `umount`
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion
    ///
    /// An `Err` means the process could not be started at all; a non-zero
    /// exit is reported through [`CommandOutput::success`].
    async fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput>;
}

/// [`CommandRunner`] that spawns real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        trace!(program, ?args, "running command");
        let out = Command::new(program).args(args).output().await?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(CommandOutput {
            success: out.status.success(),
            code: out.status.code(),
            output,
        })
    }
}

/// Answers whether a device node is present
pub trait DeviceProbe: Send + Sync {
    /// True if `path` exists, without following symlinks
    fn exists(&self, path: &Path) -> bool;
}

/// [`DeviceProbe`] backed by the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDeviceProbe;

impl DeviceProbe for SystemDeviceProbe {
    fn exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok()
    }
}
