//! Output naming and post-encode hooks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::media::{ImageFormat, MediaKind, VideoContainer};

/// Numbered candidates tried before giving up on a free output name.
const MAX_COLLISION_INDEX: u32 = 999;

/// Where an encode writes and what it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// Errors deriving an output destination.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Input has no usable file name: {0}")]
    InvalidInput(PathBuf),

    #[error("Unsupported media kind for output: {0}")]
    Unsupported(PathBuf),

    #[error("No free output name for {0}")]
    Exhausted(PathBuf),
}

/// Derives the output destination and kind for an input.
pub trait OutputPolicy: Send + Sync {
    fn output_for(&self, input: &Path, input_kind: MediaKind) -> Result<OutputTarget, OutputError>;
}

/// Output naming configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for outputs. Defaults to the input's directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Appended to the input's file stem.
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Container every video is re-muxed into. `None` keeps the input's.
    #[serde(default = "default_video_container")]
    pub video_container: Option<VideoContainer>,

    /// Format every image is converted to. `None` keeps the input's.
    #[serde(default)]
    pub image_format: Option<ImageFormat>,

    /// Directory that receives a copy of every successful output.
    #[serde(default)]
    pub keep_copy_in: Option<PathBuf>,

    /// Copy the input's modification time onto the output.
    #[serde(default = "default_preserve_modified")]
    pub preserve_modified_time: bool,
}

fn default_suffix() -> String {
    "_compressed".to_string()
}

fn default_video_container() -> Option<VideoContainer> {
    Some(VideoContainer::Mp4)
}

fn default_preserve_modified() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            suffix: default_suffix(),
            video_container: default_video_container(),
            image_format: None,
            keep_copy_in: None,
            preserve_modified_time: default_preserve_modified(),
        }
    }
}

/// Writes `<stem><suffix>.<ext>` next to the input or into a fixed directory,
/// numbering the name when it is already taken.
#[derive(Debug, Clone, Default)]
pub struct DefaultOutputPolicy {
    config: OutputConfig,
}

impl DefaultOutputPolicy {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Output kind for an input kind under this policy.
    pub fn output_kind(&self, input_kind: MediaKind) -> MediaKind {
        match input_kind {
            MediaKind::Video(container) => {
                MediaKind::Video(self.config.video_container.unwrap_or(container))
            }
            MediaKind::Image(format) => MediaKind::Image(self.config.image_format.unwrap_or(format)),
            other => other,
        }
    }
}

impl OutputPolicy for DefaultOutputPolicy {
    fn output_for(&self, input: &Path, input_kind: MediaKind) -> Result<OutputTarget, OutputError> {
        let kind = self.output_kind(input_kind);
        let extension = kind
            .extension()
            .ok_or_else(|| OutputError::Unsupported(input.to_path_buf()))?;

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OutputError::InvalidInput(input.to_path_buf()))?;

        let directory = match &self.config.directory {
            Some(dir) => dir.clone(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        let base = format!("{}{}", stem, self.config.suffix);
        let first = directory.join(format!("{}.{}", base, extension));
        if !first.exists() && first != input {
            return Ok(OutputTarget { path: first, kind });
        }

        for index in 1..=MAX_COLLISION_INDEX {
            let candidate = directory.join(format!("{} ({}).{}", base, index, extension));
            if !candidate.exists() {
                return Ok(OutputTarget {
                    path: candidate,
                    kind,
                });
            }
        }

        Err(OutputError::Exhausted(first))
    }
}

/// Error raised by a [`SuccessHook`]. Logged, never fatal.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Runs after a file was encoded successfully.
#[async_trait]
pub trait SuccessHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_success(&self, input: &Path, output: &Path) -> Result<(), HookError>;
}

/// Copies each output into a persistent directory.
pub struct CopyToDirectoryHook {
    directory: PathBuf,
}

impl CopyToDirectoryHook {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl SuccessHook for CopyToDirectoryHook {
    fn name(&self) -> &str {
        "copy_to_directory"
    }

    async fn on_success(&self, _input: &Path, output: &Path) -> Result<(), HookError> {
        let file_name = output
            .file_name()
            .ok_or_else(|| HookError::Other(format!("No file name: {}", output.display())))?;
        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::copy(output, self.directory.join(file_name)).await?;
        Ok(())
    }
}

/// Copies the input's modification time onto the output.
pub struct PreserveModifiedTimeHook;

#[async_trait]
impl SuccessHook for PreserveModifiedTimeHook {
    fn name(&self) -> &str {
        "preserve_modified_time"
    }

    async fn on_success(&self, input: &Path, output: &Path) -> Result<(), HookError> {
        let modified = tokio::fs::metadata(input).await?.modified()?;
        let output = output.to_path_buf();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let file = std::fs::OpenOptions::new().write(true).open(output)?;
            file.set_modified(modified)
        })
        .await
        .map_err(|e| HookError::Other(e.to_string()))??;
        Ok(())
    }
}

/// Hooks implied by an output configuration.
pub fn hooks_for(config: &OutputConfig) -> Vec<Arc<dyn SuccessHook>> {
    let mut hooks: Vec<Arc<dyn SuccessHook>> = Vec::new();
    if config.preserve_modified_time {
        hooks.push(Arc::new(PreserveModifiedTimeHook));
    }
    if let Some(dir) = &config.keep_copy_in {
        hooks.push(Arc::new(CopyToDirectoryHook::new(dir.clone())));
    }
    hooks
}
