//! Per-session download context.
//!
//! Everything a download needs that should be built once and reused across
//! tracks lives here: the HTTP client, the stream-info resolver, the
//! transcoding engine and a metadata cache. The context is created with
//! [`DownloadContext::init`] and torn down with [`DownloadContext::dispose`];
//! nothing is held in process-wide state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use trackforged_av::{FfmpegEngine, TranscodeEngine};

use crate::assembler::{AssembleOptions, Concurrency, SegmentAssembler};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{Fetcher, ReqwestFetcher};
use crate::resolver::{ProxyResolver, StreamInfoResolver};
use crate::tags::TrackMetadata;

pub struct DownloadContext {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    resolver: Arc<dyn StreamInfoResolver>,
    engine: Arc<dyn TranscodeEngine>,
    metadata_cache: Mutex<HashMap<u64, TrackMetadata>>,
}

impl DownloadContext {
    /// Build the real collaborators from `config`.
    ///
    /// Fails if ffmpeg cannot be located.
    pub fn init(config: Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.download.request_timeout_secs);

        let fetcher = ReqwestFetcher::new(timeout, &config.download.user_agent);
        let resolver = ProxyResolver::new(
            &config.api.base_url,
            config.api.access_token.clone(),
            &config.api.country_code,
            timeout,
        );
        let engine = FfmpegEngine::discover(config.tools.ffmpeg_path.as_deref())?;

        tracing::debug!(
            "download context ready (api: {}, quality: {}, concurrency: {})",
            config.api.base_url,
            config.download.quality,
            config.download.concurrency
        );

        Ok(Self::from_parts(
            config,
            Arc::new(fetcher),
            Arc::new(resolver),
            Arc::new(engine),
        ))
    }

    /// Assemble a context from explicit collaborators.
    pub fn from_parts(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        resolver: Arc<dyn StreamInfoResolver>,
        engine: Arc<dyn TranscodeEngine>,
    ) -> Self {
        Self {
            config,
            fetcher,
            resolver,
            engine,
            metadata_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &dyn StreamInfoResolver {
        self.resolver.as_ref()
    }

    pub fn engine(&self) -> &dyn TranscodeEngine {
        self.engine.as_ref()
    }

    pub fn assembler(&self) -> SegmentAssembler {
        SegmentAssembler::new(Arc::clone(&self.fetcher))
    }

    pub fn assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            concurrency: Concurrency::from_workers(self.config.download.concurrency),
            ..Default::default()
        }
    }

    /// Metadata for `track_id`, fetched once per context.
    ///
    /// Lookup failures are logged and yield empty metadata; a track can
    /// still be downloaded without it.
    pub async fn track_metadata(&self, track_id: u64) -> TrackMetadata {
        let cached = self.metadata_cache.lock().get(&track_id).cloned();
        if let Some(cached) = cached {
            return cached;
        }

        let metadata = match self.resolver.metadata(track_id).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => TrackMetadata::default(),
            Err(e) => {
                tracing::warn!("No metadata for track {}: {}", track_id, e);
                return TrackMetadata::default();
            }
        };

        self.metadata_cache
            .lock()
            .insert(track_id, metadata.clone());
        metadata
    }

    /// Seed the cache, e.g. from an album listing already in hand.
    pub fn remember_metadata(&self, track_id: u64, metadata: TrackMetadata) {
        self.metadata_cache.lock().insert(track_id, metadata);
    }

    /// Release cached state and collaborators.
    pub fn dispose(self) {
        let cached = self.metadata_cache.lock().len();
        tracing::debug!("disposing download context ({} cached metadata entries)", cached);
    }
}
