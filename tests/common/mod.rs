//! Shared helpers for integration tests.
//!
//! Provides an in-memory [`StubFetcher`], stub resolver and engine for
//! driving the download pipeline without a network or ffmpeg, and builders
//! for synthetic MP4 buffers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;

use trackforged::config::Config;
use trackforged::context::DownloadContext;
use trackforged::fetch::{FetchError, FetchResponse, Fetcher};
use trackforged::resolver::{AudioQuality, StreamInfo, StreamInfoResolver};
use trackforged::tags::TrackMetadata;
use trackforged_av::{OutputContainer, RemuxRequest, TranscodeEngine};

pub const MIME_BTS: &str = "application/vnd.tidal.bts";
pub const MIME_DASH: &str = "application/dash+xml";

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Serves fixed bodies by URL; unknown URLs answer 404.
#[derive(Default)]
pub struct StubFetcher {
    bodies: HashMap<String, Result<Vec<u8>, FetchError>>,
    pub requested: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_error(mut self, url: &str, error: FetchError) -> Self {
        self.bodies.insert(url.to_string(), Err(error));
        self
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.requested.lock().push(url.to_string());
        match self.bodies.get(url) {
            Some(Ok(body)) => Ok(FetchResponse::from_bytes(body.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::Status(404)),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Returns canned stream info per track id.
#[derive(Default)]
pub struct StubResolver {
    streams: HashMap<u64, StreamInfo>,
    metadata: HashMap<u64, TrackMetadata>,
}

impl StubResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, info: StreamInfo) -> Self {
        self.streams.insert(info.track_id, info);
        self
    }

    pub fn with_metadata(mut self, track_id: u64, metadata: TrackMetadata) -> Self {
        self.metadata.insert(track_id, metadata);
        self
    }
}

#[async_trait]
impl StreamInfoResolver for StubResolver {
    async fn resolve(
        &self,
        track_id: u64,
        _quality: AudioQuality,
    ) -> trackforged::Result<StreamInfo> {
        self.streams
            .get(&track_id)
            .cloned()
            .ok_or_else(|| trackforged::Error::resolve(format!("track {} not found", track_id)))
    }

    async fn metadata(&self, track_id: u64) -> trackforged::Result<Option<TrackMetadata>> {
        Ok(self.metadata.get(&track_id).cloned())
    }
}

/// Stream info carrying `manifest` (plain text, base64-encoded here).
pub fn stream_info(track_id: u64, quality: AudioQuality, mime_type: &str, manifest: &str) -> StreamInfo {
    StreamInfo {
        track_id,
        audio_quality: quality,
        manifest_mime_type: mime_type.to_string(),
        manifest: STANDARD.encode(manifest),
        track_replay_gain: None,
        track_peak_amplitude: None,
        album_replay_gain: None,
        album_peak_amplitude: None,
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Records requests and writes a recognizable output without ffmpeg.
///
/// FLAC output is the input bytes verbatim. M4A output is a synthetic file
/// whose `mdat` holds the input and whose `ilst` is present but empty.
/// Cover images are read while the workspace still exists.
#[derive(Default)]
pub struct RecordingEngine {
    pub requests: Mutex<Vec<RemuxRequest>>,
    pub covers: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl TranscodeEngine for RecordingEngine {
    async fn remux(&self, request: &RemuxRequest) -> trackforged_av::Result<()> {
        let input = tokio::fs::read(&request.input).await?;
        let output = match request.container {
            OutputContainer::Flac => input,
            OutputContainer::M4a => m4a(&input, true),
        };
        tokio::fs::write(&request.output, output).await?;
        if let Some(cover) = &request.cover {
            let image = tokio::fs::read(cover).await?;
            self.covers.lock().push(image);
        }
        self.requests.lock().push(request.clone());
        Ok(())
    }
}

/// Build a [`DownloadContext`] writing into `output_dir`.
pub fn context(
    output_dir: &std::path::Path,
    fetcher: StubFetcher,
    resolver: StubResolver,
    engine: Arc<RecordingEngine>,
    concurrency: usize,
) -> DownloadContext {
    let mut config = Config::default();
    config.download.output_dir = output_dir.to_path_buf();
    config.download.concurrency = concurrency;
    DownloadContext::from_parts(config, Arc::new(fetcher), Arc::new(resolver), engine)
}

// ---------------------------------------------------------------------------
// MP4 builders
// ---------------------------------------------------------------------------

/// One atom with a 32-bit size header.
pub fn atom(atom_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(atom_type);
    out.extend_from_slice(payload);
    out
}

/// `ftyp`, `mdat(media)`, then `moov`, optionally with `udta/meta/ilst`.
pub fn m4a(media: &[u8], with_udta: bool) -> Vec<u8> {
    let mut moov_payload = atom(b"mvhd", &[0u8; 100]);
    if with_udta {
        let mut meta_payload = vec![0u8; 4];
        meta_payload.extend(atom(b"hdlr", &[0u8; 25]));
        meta_payload.extend(atom(b"ilst", &[]));
        moov_payload.extend(atom(b"udta", &atom(b"meta", &meta_payload)));
    }

    let mut file = atom(b"ftyp", b"M4A \0\0\0\0");
    file.extend(atom(b"mdat", media));
    file.extend(atom(b"moov", &moov_payload));
    file
}
