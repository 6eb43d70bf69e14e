use super::{types::Config, ConfigError};

/// Highest CRF accepted by x264/x265.
const MAX_CRF: u8 = 51;

/// Validate configuration
///
/// Checks:
/// - `encoding.crf` is at most 51
/// - `encoding.jpeg_quality` is within 2..=31
/// - ffmpeg and ffprobe paths are set
/// - `audit.buffer_size` is not 0
/// - `output.suffix` is set unless outputs go to a separate directory
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.encoding.crf > MAX_CRF {
        return Err(ConfigError::ValidationError(format!(
            "encoding.crf must be at most {}, got {}",
            MAX_CRF, config.encoding.crf
        )));
    }

    if !(2..=31).contains(&config.encoding.jpeg_quality) {
        return Err(ConfigError::ValidationError(format!(
            "encoding.jpeg_quality must be between 2 and 31, got {}",
            config.encoding.jpeg_quality
        )));
    }

    if config.engine.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.ffmpeg_path cannot be empty".to_string(),
        ));
    }

    if config.engine.ffprobe_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.ffprobe_path cannot be empty".to_string(),
        ));
    }

    if config.audit.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "audit.buffer_size cannot be 0".to_string(),
        ));
    }

    if config.output.suffix.is_empty() && config.output.directory.is_none() {
        return Err(ConfigError::ValidationError(
            "output.suffix cannot be empty when outputs share the input directory".to_string(),
        ));
    }

    Ok(())
}
