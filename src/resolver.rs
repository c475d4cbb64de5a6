//! Stream-info resolution.
//!
//! Turns a track id and requested quality into the manifest the assembler
//! works from. The default implementation talks to an authenticating proxy
//! that forwards to the catalog's playback-info endpoint.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tags::{CatalogTrack, ReplayGain, TrackMetadata};

/// Requested or delivered audio quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioQuality {
    Low,
    High,
    #[default]
    Lossless,
    HiResLossless,
}

impl AudioQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioQuality::Low => "LOW",
            AudioQuality::High => "HIGH",
            AudioQuality::Lossless => "LOSSLESS",
            AudioQuality::HiResLossless => "HI_RES_LOSSLESS",
        }
    }

    /// FLAC-carrying qualities.
    pub fn is_lossless(&self) -> bool {
        matches!(self, AudioQuality::Lossless | AudioQuality::HiResLossless)
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioQuality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "LOW" => Ok(AudioQuality::Low),
            "HIGH" => Ok(AudioQuality::High),
            "LOSSLESS" => Ok(AudioQuality::Lossless),
            "HI_RES_LOSSLESS" | "HI_RES" => Ok(AudioQuality::HiResLossless),
            _ => Err(format!("Unknown audio quality: {}", s)),
        }
    }
}

/// Playback info for one track.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub track_id: u64,
    pub audio_quality: AudioQuality,
    pub manifest_mime_type: String,
    /// Base64 manifest body.
    pub manifest: String,
    #[serde(default)]
    pub track_replay_gain: Option<f64>,
    #[serde(default)]
    pub track_peak_amplitude: Option<f64>,
    #[serde(default)]
    pub album_replay_gain: Option<f64>,
    #[serde(default)]
    pub album_peak_amplitude: Option<f64>,
}

impl StreamInfo {
    /// Loudness values delivered alongside the manifest.
    pub fn replay_gain(&self) -> ReplayGain {
        ReplayGain {
            track_gain: self.track_replay_gain,
            track_peak: self.track_peak_amplitude,
            album_gain: self.album_replay_gain,
            album_peak: self.album_peak_amplitude,
        }
    }
}

/// Source of [`StreamInfo`].
#[async_trait]
pub trait StreamInfoResolver: Send + Sync {
    async fn resolve(&self, track_id: u64, quality: AudioQuality) -> Result<StreamInfo>;

    /// Descriptive metadata, when the source can provide it.
    async fn metadata(&self, _track_id: u64) -> Result<Option<TrackMetadata>> {
        Ok(None)
    }
}

/// Resolves through the proxy's `tracks/{id}/playbackinfopostpaywall` route.
pub struct ProxyResolver {
    client: Client,
    base_url: String,
    access_token: Option<String>,
    country_code: String,
}

impl ProxyResolver {
    pub fn new(
        base_url: &str,
        access_token: Option<String>,
        country_code: &str,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            country_code: country_code.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get(
        &self,
        track_id: u64,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .get(self.url(path))
            .query(query)
            .query(&[("countryCode", self.country_code.as_str())]);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::resolve(format!("track {}: {}", track_id, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::resolve(format!(
                "track {}: HTTP {}: {}",
                track_id,
                status.as_u16(),
                body.trim()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl StreamInfoResolver for ProxyResolver {
    async fn resolve(&self, track_id: u64, quality: AudioQuality) -> Result<StreamInfo> {
        tracing::debug!("resolving stream info for track {} at {}", track_id, quality);

        let response = self
            .get(
                track_id,
                &format!("tracks/{}/playbackinfopostpaywall", track_id),
                &[
                    ("audioquality", quality.as_str()),
                    ("playbackmode", "STREAM"),
                    ("assetpresentation", "FULL"),
                ],
            )
            .await?;

        let info: StreamInfo = response
            .json()
            .await
            .map_err(|e| Error::resolve(format!("track {}: invalid response: {}", track_id, e)))?;

        if info.audio_quality != quality {
            tracing::info!(
                "track {} delivered at {} (requested {})",
                track_id,
                info.audio_quality,
                quality
            );
        }

        Ok(info)
    }

    async fn metadata(&self, track_id: u64) -> Result<Option<TrackMetadata>> {
        let response = self
            .get(track_id, &format!("tracks/{}", track_id), &[])
            .await?;
        let track: CatalogTrack = response
            .json()
            .await
            .map_err(|e| Error::resolve(format!("track {}: invalid metadata: {}", track_id, e)))?;
        Ok(Some(track.into()))
    }
}
