//! Codec-copy remuxing through ffmpeg.
//!
//! The downloader never re-encodes audio. The engine copies the assembled
//! elementary stream into its final container and writes whatever standard
//! metadata ffmpeg's `-metadata key=value` interface can carry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::command::ToolCommand;
use crate::tools::get_tool_path;
use crate::{Error, Result};

/// Remuxing a single track should never take this long.
const REMUX_TIMEOUT: Duration = Duration::from_secs(120);

/// Final container for a downloaded track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputContainer {
    /// Native FLAC stream with Vorbis comments.
    Flac,
    /// MPEG-4 audio (AAC or ALAC) with iTunes-style `ilst` metadata.
    M4a,
}

impl OutputContainer {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputContainer::Flac => "flac",
            OutputContainer::M4a => "m4a",
        }
    }

    /// ffmpeg muxer name.
    pub fn ffmpeg_format(&self) -> &'static str {
        match self {
            OutputContainer::Flac => "flac",
            OutputContainer::M4a => "ipod",
        }
    }

    /// Whether freeform tags must be spliced in after remuxing.
    ///
    /// ffmpeg writes arbitrary keys to FLAC Vorbis comments verbatim, but
    /// for MP4 it only maps a fixed set of keys to `ilst` items.
    pub fn needs_atom_patch(&self) -> bool {
        matches!(self, OutputContainer::M4a)
    }
}

/// One remux job.
#[derive(Debug, Clone)]
pub struct RemuxRequest {
    /// Assembled source stream (MP4, fragmented MP4 or raw FLAC).
    pub input: PathBuf,
    /// Destination file; overwritten if present.
    pub output: PathBuf,
    pub container: OutputContainer,
    /// Standard metadata pairs, written in order.
    pub metadata: Vec<(String, String)>,
    /// Optional cover image attached as the container's artwork.
    pub cover: Option<PathBuf>,
}

/// Something that turns an assembled stream into a finished file.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Copy `request.input` into `request.output`, embedding metadata.
    async fn remux(&self, request: &RemuxRequest) -> Result<()>;
}

/// [`TranscodeEngine`] backed by the `ffmpeg` CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegEngine {
    /// Use the given ffmpeg binary.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            timeout: REMUX_TIMEOUT,
        }
    }

    /// Locate ffmpeg, preferring `configured` over `PATH`.
    pub fn discover(configured: Option<&Path>) -> Result<Self> {
        let program = get_tool_path("ffmpeg", configured)?;
        tracing::debug!("using ffmpeg at {}", program.display());
        Ok(Self::new(program))
    }

    /// Build the ffmpeg argument list for `request`.
    pub fn build_args(&self, request: &RemuxRequest) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            request.input.to_string_lossy().into_owned(),
        ];

        if let Some(cover) = &request.cover {
            args.push("-i".into());
            args.push(cover.to_string_lossy().into_owned());
        }

        args.extend(["-map".into(), "0:a".into(), "-c:a".into(), "copy".into()]);

        if request.cover.is_some() {
            args.extend([
                "-map".into(),
                "1:v".into(),
                "-c:v".into(),
                "copy".into(),
                "-disposition:v".into(),
                "attached_pic".into(),
            ]);
        }

        for (key, value) in &request.metadata {
            if value.is_empty() {
                continue;
            }
            args.push("-metadata".into());
            args.push(format!("{key}={value}"));
        }

        args.push("-f".into());
        args.push(request.container.ffmpeg_format().into());
        args.push(request.output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn remux(&self, request: &RemuxRequest) -> Result<()> {
        if !request.input.exists() {
            return Err(Error::file_not_found(&request.input));
        }

        tracing::info!(
            "remuxing {} -> {} ({})",
            request.input.display(),
            request.output.display(),
            request.container.extension()
        );

        ToolCommand::new(self.program.clone())
            .args(self.build_args(request))
            .timeout(self.timeout)
            .execute()
            .await?;

        if !request.output.exists() {
            return Err(Error::tool_failed(
                "ffmpeg",
                format!("no output written to {}", request.output.display()),
            ));
        }

        Ok(())
    }
}
