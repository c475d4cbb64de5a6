//! Track and batch download orchestration.
//!
//! One track goes resolve → decode → plan → assemble → remux → patch →
//! finalize. Any failure aborts that track and nothing is left at the
//! destination. Batches skip failed tracks and keep going.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use trackforged_av::{OutputContainer, RemuxRequest, Workspace};
use trackforged_media::{build_segment_plan, decode_manifest, inject_tags, SegmentPlan};

use crate::assembler::{AssembleOptions, Progress, ProgressWindow};
use crate::context::DownloadContext;
use crate::error::{Error, Result};
use crate::resolver::AudioQuality;
use crate::tags::ReplayGain;

/// Share of the progress bar spent fetching segments.
const ASSEMBLY_SHARE: f64 = 0.9;

/// A finished track.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub track_id: u64,
    pub path: PathBuf,
    pub quality: AudioQuality,
    pub container: OutputContainer,
    pub bytes_fetched: usize,
    /// Number of freeform atoms spliced into an M4A after remuxing.
    pub patched_tags: usize,
}

/// Result of a batch download.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<DownloadOutcome>,
    pub failed: Vec<(u64, Error)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Container for a delivered quality.
pub fn output_container(quality: AudioQuality) -> OutputContainer {
    if quality.is_lossless() {
        OutputContainer::Flac
    } else {
        OutputContainer::M4a
    }
}

/// Download one track into the configured output directory.
pub async fn download_track(
    ctx: &DownloadContext,
    track_id: u64,
    progress: &(dyn Fn(Progress) + Send + Sync),
) -> Result<DownloadOutcome> {
    let quality = ctx.config().download.quality;
    tracing::info!("Downloading track {} ({})", track_id, quality);

    let info = ctx.resolver().resolve(track_id, quality).await?;
    let manifest = decode_manifest(&info.manifest, &info.manifest_mime_type)?;
    let plan = build_segment_plan(&manifest);
    tracing::debug!(
        "track {}: {:?} manifest, {} segment(s)",
        track_id,
        manifest.transport_kind(),
        plan.len()
    );

    let mut options = ctx.assemble_options();
    options.window = ProgressWindow {
        start: 0.0,
        end: ASSEMBLY_SHARE,
    };
    let stream = ctx.assembler().assemble(&plan, &options, progress).await?;

    let metadata = ctx.track_metadata(track_id).await;
    let container = output_container(info.audio_quality);
    let destination = ctx
        .config()
        .download
        .output_dir
        .join(metadata.file_name(track_id, container.extension()));

    let workspace = Workspace::new(&destination)?;
    let source = workspace.temp_file("source.mp4");
    tokio::fs::write(&source, &stream.bytes).await?;

    let cover = match &metadata.cover_url {
        Some(url) => fetch_cover(ctx, url, &workspace).await,
        None => None,
    };

    let replay_gain = info.replay_gain();
    let mut engine_tags = metadata.standard_tags();
    if !container.needs_atom_patch() {
        engine_tags.extend(
            replay_gain
                .tags()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );
    }

    ctx.engine()
        .remux(&RemuxRequest {
            input: source,
            output: workspace.output().to_path_buf(),
            container,
            metadata: engine_tags,
            cover,
        })
        .await?;
    progress(Progress::Fraction(0.95));

    let patched_tags = if container.needs_atom_patch() {
        patch_replay_gain(workspace.output(), &replay_gain).await?
    } else {
        0
    };

    let path = workspace.finalize()?;
    progress(Progress::Fraction(1.0));
    tracing::info!("Saved track {} to {}", track_id, path.display());

    Ok(DownloadOutcome {
        track_id,
        path,
        quality: info.audio_quality,
        container,
        bytes_fetched: stream.len(),
        patched_tags,
    })
}

/// Download album artwork into the workspace.
///
/// Artwork is optional: a failed fetch is logged and the track is remuxed
/// without it.
async fn fetch_cover(ctx: &DownloadContext, url: &str, workspace: &Workspace) -> Option<PathBuf> {
    let plan = SegmentPlan {
        urls: vec![url.to_string()],
    };
    let image = match ctx
        .assembler()
        .assemble(&plan, &AssembleOptions::default(), &|_: Progress| {})
        .await
    {
        Ok(image) if !image.is_empty() => image,
        Ok(_) => {
            tracing::warn!("cover {} is empty; continuing without artwork", url);
            return None;
        }
        Err(e) => {
            tracing::warn!("cover fetch failed, continuing without artwork: {}", e);
            return None;
        }
    };

    let path = workspace.temp_file("cover.jpg");
    match tokio::fs::write(&path, &image.bytes).await {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::warn!("could not write cover to {}: {}", path.display(), e);
            None
        }
    }
}

/// Splice ReplayGain atoms into the remuxed file; returns how many were written.
async fn patch_replay_gain(path: &Path, replay_gain: &ReplayGain) -> Result<usize> {
    let tags = replay_gain.tags();
    if tags.is_empty() {
        return Ok(0);
    }

    let original = tokio::fs::read(path).await?;
    match inject_tags(&original, tags.iter().map(|(k, v)| (*k, v.as_str()))) {
        Cow::Owned(patched) => {
            tokio::fs::write(path, patched).await?;
            Ok(tags.len())
        }
        Cow::Borrowed(_) => {
            tracing::warn!(
                "{} has no metadata atoms; ReplayGain tags not written",
                path.display()
            );
            Ok(0)
        }
    }
}

/// Download several tracks in order, skipping the ones that fail.
///
/// `on_track` is called with `(position, total, track_id)` before each track.
pub async fn download_batch(
    ctx: &DownloadContext,
    track_ids: &[u64],
    on_track: &(dyn Fn(usize, usize, u64) + Send + Sync),
    progress: &(dyn Fn(Progress) + Send + Sync),
) -> BatchReport {
    let mut report = BatchReport::default();
    let total = track_ids.len();

    for (position, &track_id) in track_ids.iter().enumerate() {
        on_track(position, total, track_id);
        match download_track(ctx, track_id, progress).await {
            Ok(outcome) => report.completed.push(outcome),
            Err(e) => {
                tracing::warn!("Skipping track {}: {}", track_id, e);
                report.failed.push((track_id, e));
            }
        }
    }

    tracing::info!(
        "Batch finished: {} downloaded, {} skipped",
        report.completed.len(),
        report.failed.len()
    );
    report
}
