mod types;

pub use types::*;

use std::path::Path;

use crate::error::{Error, Result};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read config file {:?}: {}", path, e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse config file {:?}: {}", path, e)))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./trackforged.toml", "~/.config/trackforged/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.api.base_url.trim().is_empty() {
        return Err(Error::config("api.base_url cannot be empty"));
    }

    if config.download.request_timeout_secs == 0 {
        return Err(Error::config("download.request_timeout_secs cannot be 0"));
    }

    if config.api.access_token.as_deref().map_or(true, str::is_empty) {
        tracing::warn!("No api.access_token configured; the proxy must supply credentials");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AudioQuality;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8787/v1");
        assert_eq!(config.api.country_code, "US");
        assert_eq!(config.download.quality, AudioQuality::Lossless);
        assert_eq!(config.download.concurrency, 1);
        assert_eq!(config.download.request_timeout_secs, 30);
        assert!(config.tools.ffmpeg_path.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[api]
access_token = "tok"

[download]
quality = "HI_RES_LOSSLESS"
concurrency = 6
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.api.access_token.as_deref(), Some("tok"));
        assert_eq!(config.api.base_url, "http://localhost:8787/v1");
        assert_eq!(config.download.quality, AudioQuality::HiResLossless);
        assert_eq!(config.download.concurrency, 6);
        assert_eq!(config.download.request_timeout_secs, 30);
    }

    #[test]
    fn test_rejects_empty_base_url() {
        let mut config = Config::default();
        config.api.base_url = "  ".to_string();
        assert!(matches!(validate_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = Config::default();
        config.download.request_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[download\nquality = ").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_missing_custom_path() {
        let err = load_config_or_default(Some(Path::new("/nonexistent/trackforged.toml")))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
