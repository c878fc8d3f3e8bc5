/*!
 * External subtitle synchronization.
 *
 * The default tool is `alass`, invoked as `alass <reference> <target> <target>`
 * so the corrected timing overwrites the target file. The tool is optional:
 * callers treat every `AlignmentError` as "no timing correction".
 */

use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::AlignmentConfig;
use crate::errors::AlignmentError;

/// Rewrites `target` so its timing follows `reference`
#[async_trait]
pub trait SubtitleSynchronizer: Send + Sync {
    async fn synchronize(&self, reference: &Path, target: &Path) -> Result<(), AlignmentError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Leaves the target untouched
#[derive(Debug, Default, Clone)]
pub struct PassthroughSynchronizer;

#[async_trait]
impl SubtitleSynchronizer for PassthroughSynchronizer {
    async fn synchronize(&self, _reference: &Path, _target: &Path) -> Result<(), AlignmentError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Runs an external alignment program under a timeout
#[derive(Debug, Clone)]
pub struct ExternalAligner {
    /// Configured name or path, kept for error messages
    tool: String,
    /// Resolved executable; `None` when it could not be found
    path: Option<PathBuf>,
    timeout: Duration,
}

impl ExternalAligner {
    /// Resolve `tool` as an existing path first, then through `PATH`
    pub fn new(tool: impl Into<String>, timeout: Duration) -> Self {
        let tool = tool.into();
        let path = resolve_tool(&tool);
        match &path {
            Some(p) => debug!("Alignment tool '{}' resolved to {}", tool, p.display()),
            None => info!("Alignment tool '{}' not found; foreign tracks keep their timing", tool),
        }
        Self { tool, path, timeout }
    }

    pub fn from_config(config: &AlignmentConfig) -> Self {
        Self::new(config.tool.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }
}

fn resolve_tool(tool: &str) -> Option<PathBuf> {
    let candidate = Path::new(tool);
    if candidate.components().count() > 1 && candidate.is_file() {
        return Some(candidate.to_path_buf());
    }
    which::which(tool).ok()
}

#[async_trait]
impl SubtitleSynchronizer for ExternalAligner {
    async fn synchronize(&self, reference: &Path, target: &Path) -> Result<(), AlignmentError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| AlignmentError::ToolNotFound(self.tool.clone()))?;

        debug!("Running {} {} {} {}", path.display(), reference.display(), target.display(), target.display());

        let run = Command::new(path)
            .arg(reference)
            .arg(target)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| AlignmentError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AlignmentError::ToolFailed {
                status: output.status.to_string(),
                stderr: stderr.trim().chars().take(500).collect(),
            });
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.tool
    }
}
