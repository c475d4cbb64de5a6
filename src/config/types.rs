use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::resolver::AudioQuality;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the authenticating proxy
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth access token sent as `Authorization: Bearer`
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_country_code")]
    pub country_code: String,
}

fn default_base_url() -> String {
    "http://localhost:8787/v1".to_string()
}

fn default_country_code() -> String {
    "US".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
            country_code: default_country_code(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default)]
    pub quality: AudioQuality,

    /// Segment fetch workers (0 or 1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_concurrency() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("trackforged/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            quality: AudioQuality::default(),
            concurrency: default_concurrency(),
            output_dir: default_output_dir(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}
