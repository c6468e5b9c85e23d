//! Upload hand-off for device-produced artifacts.
//!
//! Artifacts such as health files are copied into a staging directory and an
//! external upload command is launched for them. The command runs on its own;
//! the request never waits for the upload.

use crate::error::{Result, WorkflowError};
use pinpad_core::SftpSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Launcher for the external upload process.
pub trait UploadLauncher: Send + Sync {
    /// Start `command` for `artifact` without waiting for it to finish.
    fn launch(&self, command: &[String], artifact: &Path) -> Result<()>;
}

/// Launcher spawning the upload command as a child process.
///
/// The staged artifact path is appended as the last argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessUploadLauncher;

impl UploadLauncher for ProcessUploadLauncher {
    fn launch(&self, command: &[String], artifact: &Path) -> Result<()> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| WorkflowError::handoff("upload command is empty"))?;

        let child = tokio::process::Command::new(program)
            .args(args)
            .arg(artifact)
            .stdin(std::process::Stdio::null())
            .spawn()?;

        tracing::info!(
            program = %program,
            pid = child.id().unwrap_or_default(),
            artifact = %artifact.display(),
            "upload launched"
        );
        Ok(())
    }
}

/// Stages artifacts and launches their upload.
#[derive(Clone)]
pub struct SftpHandoff {
    settings: SftpSettings,
    launcher: Arc<dyn UploadLauncher>,
}

impl std::fmt::Debug for SftpHandoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpHandoff")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SftpHandoff {
    pub fn new(settings: SftpSettings, launcher: Arc<dyn UploadLauncher>) -> Self {
        Self { settings, launcher }
    }

    /// Hand-off using [`ProcessUploadLauncher`].
    pub fn with_process_launcher(settings: SftpSettings) -> Self {
        Self::new(settings, Arc::new(ProcessUploadLauncher))
    }

    pub fn settings(&self) -> &SftpSettings {
        &self.settings
    }

    /// Copy `artifact` into the staging directory and launch its upload.
    ///
    /// Returns the staged path.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be staged or the upload
    /// command cannot be started.
    pub async fn hand_off(&self, artifact: &Path) -> Result<PathBuf> {
        let file_name = artifact.file_name().ok_or_else(|| {
            WorkflowError::handoff(format!("artifact has no file name: {}", artifact.display()))
        })?;

        tokio::fs::create_dir_all(&self.settings.staging_dir).await?;
        let staged = self.settings.staging_dir.join(file_name);
        tokio::fs::copy(artifact, &staged).await?;

        self.launcher.launch(&self.settings.upload_command, &staged)?;

        tracing::info!(
            artifact = %artifact.display(),
            staged = %staged.display(),
            "artifact handed off for upload"
        );
        Ok(staged)
    }
}
