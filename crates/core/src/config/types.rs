use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::job::OutputConfig;
use crate::planner::EncodingSettings;

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub encoding: EncodingSettings,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Audit log configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether encode records are persisted.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// SQLite database path.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Records buffered between the runner and the writer.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_audit_enabled() -> bool {
    true
}

fn default_database_path() -> PathBuf {
    PathBuf::from("ffshare-audit.db")
}

fn default_buffer_size() -> usize {
    256
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            database_path: default_database_path(),
            buffer_size: default_buffer_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VideoContainer;
    use crate::planner::{Preset, VideoCodec};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.encoding.crf, 23);
        assert_eq!(config.output.suffix, "_compressed");
        assert_eq!(config.audit.buffer_size, 256);
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
[engine]
ffmpeg_path = "/usr/local/bin/ffmpeg"
extra_global_args = ["-threads", "2"]

[encoding]
preset = "veryslow"
video_codec = "h265"
crf = 28
max_video_resolution = 720
max_file_size_kb = 8000

[output]
directory = "/tmp/out"
video_container = "mkv"

[audit]
enabled = false
database_path = "/var/lib/ffshare/audit.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.engine.extra_global_args, vec!["-threads", "2"]);
        assert_eq!(config.encoding.preset, Preset::Veryslow);
        assert_eq!(config.encoding.video_codec, VideoCodec::H265);
        assert_eq!(config.encoding.max_file_size_kb, 8000);
        assert_eq!(config.output.directory, Some(PathBuf::from("/tmp/out")));
        assert_eq!(config.output.video_container, Some(VideoContainer::Mkv));
        assert!(!config.audit.enabled);
    }
}
