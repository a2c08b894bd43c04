use service_core::error::AppError;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Runs external programs with a wall-clock limit. A program that outlives
/// the limit is killed, not abandoned.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
    ) -> Result<Output, AppError> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            program = %program,
            args = ?args,
            timeout_secs = %self.timeout.as_secs(),
            "Executing command"
        );

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                tracing::error!(
                    program = %program,
                    timeout_secs = %self.timeout.as_secs(),
                    "Command timed out, killing it"
                );
                AppError::InternalError(anyhow::anyhow!(
                    "Command timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to start {}: {}", program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(
                program = %program,
                status = %output.status,
                stderr = %stderr,
                "Command failed"
            );
            return Err(AppError::InternalError(anyhow::anyhow!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        tracing::debug!(
            program = %program,
            output_size = output.stdout.len(),
            "Command succeeded"
        );

        Ok(output)
    }
}
