use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trackforged")]
#[command(author, version, about = "Lossless track downloader and MP4 tag patcher")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    ///
    /// `--verbose` turns on debug mode: per-segment fetches and atom walks
    /// are traced, ffmpeg command lines are logged.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "trackforged=trace,trackforged_media=trace,trackforged_av=debug"
        } else {
            "trackforged=info,trackforged_media=info,trackforged_av=info"
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download one or more tracks by id
    Download {
        /// Track ids; more than one runs a batch that skips failures
        #[arg(required = true)]
        track_ids: Vec<u64>,

        /// Requested quality (LOW, HIGH, LOSSLESS, HI_RES_LOSSLESS)
        #[arg(short, long)]
        quality: Option<String>,

        /// Segment fetch workers (0 or 1 = sequential)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Decode a base64 manifest and print its segment plan
    Manifest {
        /// Manifest MIME type
        #[arg(long, default_value = "application/vnd.tidal.bts")]
        mime_type: String,

        /// Base64 manifest payload
        #[arg(required = true)]
        payload: String,
    },

    /// Inject freeform tags into an M4A file in place
    Tag {
        /// File to patch
        #[arg(required = true)]
        file: PathBuf,

        /// Tag as KEY=VALUE (repeatable)
        #[arg(short, long = "tag", value_parser = parse_key_value, required = true)]
        tags: Vec<(String, String)>,
    },

    /// List freeform tags in an M4A file
    Tags {
        /// File to read
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Parse `KEY=VALUE`; the value may itself contain `=`.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
