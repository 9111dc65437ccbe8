//! External command execution.
//!
//! Every package manager, systemd, nginx and certbot call goes through a
//! [`CommandRunner`], so a dry run or a test can swap the executor out.

use std::fmt;
use std::future::Future;

use tokio::process::Command;
use tracing::{error, info};

use super::ProvisionError;

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Executes provisioning commands.
pub trait CommandRunner {
    fn run(&self, command: &CommandLine)
        -> impl Future<Output = Result<(), ProvisionError>> + Send;
}

/// Runs commands on the host, failing on non-zero exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, command: &CommandLine) -> Result<(), ProvisionError> {
        info!(command = %command, "provision_command_starting");

        let status = Command::new(&command.program)
            .args(&command.args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .status()
            .await
            .map_err(|source| ProvisionError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        if !status.success() {
            error!(command = %command, status = %status, "provision_command_failed");
            return Err(ProvisionError::CommandFailed {
                command: command.to_string(),
                status: status.to_string(),
            });
        }

        info!(command = %command, "provision_command_complete");
        Ok(())
    }
}

/// Logs commands without running them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    async fn run(&self, command: &CommandLine) -> Result<(), ProvisionError> {
        info!(command = %command, "provision_command_skipped");
        Ok(())
    }
}
