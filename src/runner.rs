use std::process::Command;
use tracing::debug;

use crate::error::DistributorError;

/// Captured result of one external process run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// `-1` when the process was terminated by a signal
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs an external command to completion.
pub trait CommandRunner {
    fn run(&self, argv: &[String]) -> Result<ProcessOutput, DistributorError>;
}

/// Runs commands as child processes, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> Result<ProcessOutput, DistributorError> {
        let (program, args) = argv.split_first().ok_or_else(|| DistributorError::Spawn {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line"),
        })?;

        debug!(command = %argv.join(" "), "running external command");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| DistributorError::Spawn {
                program: program.clone(),
                source,
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(exit_code, "external command finished");

        Ok(ProcessOutput {
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
