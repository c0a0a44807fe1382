//! External command execution
//!
//! Commands are spawned directly (no shell), so arguments never need
//! quoting. Names reaching this point have already been validated.

use crate::error::GatewayError;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

fn render(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Run a command and capture its output regardless of exit status
pub async fn run(program: &str, args: &[&str]) -> Result<CommandOutput, GatewayError> {
    let command = render(program, args);
    debug!(command = %command, "Executing");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| GatewayError::Spawn {
            command: command.clone(),
            source,
        })?;

    let result = CommandOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };

    trace!(command = %command, status = result.status, "Command finished");
    Ok(result)
}

/// Run a command and turn a non-zero exit status into an error
pub async fn run_checked(program: &str, args: &[&str]) -> Result<String, GatewayError> {
    let output = run(program, args).await?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(GatewayError::CommandFailed {
            command: render(program, args),
            status: output.status,
            stderr: output.stderr,
        })
    }
}
