//! External model process as a vector source

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use super::VectorSource;
use crate::config::ProcessConfig;
use crate::error::{Error, Result};
use crate::vector::{SparseVector, parse_process_output};

/// Runs `<program> [args...] -content <text>` and parses the first stdout line
///
/// Each attempt is bounded by the configured timeout; the child is killed
/// when it times out. Spawn failures, non-zero exits, timeouts and empty
/// output are retried `retries` times. Malformed output is not retried.
#[derive(Debug, Clone)]
pub struct ProcessSource {
    config: ProcessConfig,
}

impl ProcessSource {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    async fn run_once(&self, content: &str) -> Result<String> {
        let program = &self.config.program;
        let child = Command::new(program)
            .args(&self.config.args)
            .arg("-content")
            .arg(content)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::VectorSource(format!("failed to spawn '{}': {}", program, e)))?;

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::VectorSource(format!(
                    "'{}' timed out after {} ms",
                    program, self.config.timeout_ms
                ))
            })?
            .map_err(|e| Error::VectorSource(format!("'{}' failed: {}", program, e)))?;

        if !output.status.success() {
            return Err(Error::VectorSource(format!(
                "'{}' exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.lines().next().map(str::trim) {
            Some(line) if !line.is_empty() => Ok(line.to_string()),
            _ => Err(Error::VectorSource(format!(
                "'{}' produced no output",
                program
            ))),
        }
    }
}

#[async_trait]
impl VectorSource for ProcessSource {
    async fn vectorize(&self, id: &str, content: &str) -> Result<SparseVector> {
        let attempts = self.config.retries + 1;
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.run_once(content).await {
                Ok(line) => {
                    debug!("process output for '{}': {}", id, line);
                    return parse_process_output(&line);
                }
                Err(e) => {
                    warn!("attempt {}/{} for '{}' failed: {}", attempt, attempts, id, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::VectorSource("no attempts made".into())))
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
