use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment overrides, e.g. `FFSHARE_ENCODING__CRF=28`.
pub const ENV_PREFIX: &str = "FFSHARE_";

/// Load configuration from file with environment variable overrides
///
/// Nested keys are separated by a double underscore since field names
/// contain single ones.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from defaults and environment only
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    Figment::new()
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[encoding]
crf = 30
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.encoding.crf, 30);
    }

    #[test]
    fn test_load_config_from_str_invalid() {
        let toml = r#"
[encoding]
preset = "warp_speed"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config(Path::new("/nonexistent/ffshare.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[engine]
log_level = "error"

[output]
suffix = "_small"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.engine.log_level, "error");
        assert_eq!(config.output.suffix, "_small");
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "ffshare.toml",
                r#"
[encoding]
crf = 20
max_file_size_kb = 1000
"#,
            )?;
            jail.set_env("FFSHARE_ENCODING__MAX_FILE_SIZE_KB", "2500");

            let config = load_config(Path::new("ffshare.toml")).expect("config should load");
            assert_eq!(config.encoding.crf, 20);
            assert_eq!(config.encoding.max_file_size_kb, 2500);
            Ok(())
        });
    }
}
