//! One interpreter process per snippet.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;
use woda_common::CapabilityError;
use woda_config::schema::ExecutorConfig;

#[derive(Debug, Clone)]
pub struct Interpreter {
    program: String,
    args: Vec<String>,
}

impl Interpreter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Feed `code` on stdin and wait. Blocking.
    ///
    /// Returns captured stdout on success. On failure the error carries the
    /// last non-empty stderr line, or the exit status when stderr is empty.
    pub fn run(&self, code: &str) -> Result<String, CapabilityError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CapabilityError::Evaluation(format!("failed to start {}: {e}", self.program))
            })?;

        // Feed stdin on its own thread so a chatty interpreter can drain
        // stdout while the snippet is still being written.
        let feeder = child.stdin.take().map(|mut stdin| {
            let code = code.to_owned();
            std::thread::spawn(move || {
                // A snippet that exits early closes the pipe; the exit
                // status tells the rest.
                if let Err(e) = stdin.write_all(code.as_bytes()) {
                    debug!(error = %e, "interpreter closed stdin early");
                }
            })
        });

        let output = child.wait_with_output().map_err(|e| {
            CapabilityError::Evaluation(format!("failed to wait for {}: {e}", self.program))
        })?;
        if let Some(feeder) = feeder {
            if feeder.join().is_err() {
                debug!("stdin feeder panicked");
            }
        }

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("process exited with {}", output.status));
        Err(CapabilityError::Evaluation(reason))
    }
}
