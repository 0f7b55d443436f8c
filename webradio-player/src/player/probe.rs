//! Track duration probing
//!
//! Durations come from an external tool; the trait is the seam tests use to
//! avoid depending on it.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Source of track durations
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Total playing time of `path` in whole seconds
    async fn duration(&self, path: &Path) -> Result<u64>;
}

/// Runs `<program> -p %S <file>`, which prints the duration in seconds
pub struct Mp3InfoProbe {
    program: String,
}

impl Mp3InfoProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl DurationProbe for Mp3InfoProbe {
    async fn duration(&self, path: &Path) -> Result<u64> {
        let probe_error = |reason: String| Error::Probe {
            path: path.to_path_buf(),
            reason,
        };

        let output = Command::new(&self.program)
            .arg("-p")
            .arg("%S")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| probe_error(format!("failed to execute {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(probe_error(format!(
                "{} failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let seconds = stdout
            .trim()
            .parse::<u64>()
            .map_err(|_| probe_error(format!("unexpected output {:?}", stdout.trim())))?;

        debug!(path = %path.display(), seconds, "Probed duration");
        Ok(seconds)
    }
}
