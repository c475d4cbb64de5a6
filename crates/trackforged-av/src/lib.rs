//! # trackforged-av
//!
//! The external-tool side of trackforged.
//!
//! This crate provides:
//! - [`TranscodeEngine`], the seam the downloader remuxes through, and
//!   [`FfmpegEngine`], its ffmpeg CLI implementation (codec copy only)
//! - [`ToolCommand`], which runs ffmpeg and kills it if it hangs
//! - Tool discovery ([`check_tools`], [`get_tool_path`])
//! - [`Workspace`], per-track scratch space with atomic finalization
//!
//! ## Example
//!
//! ```no_run
//! use trackforged_av::{FfmpegEngine, OutputContainer, RemuxRequest, TranscodeEngine};
//!
//! # async fn example() -> trackforged_av::Result<()> {
//! let engine = FfmpegEngine::discover(None)?;
//! engine
//!     .remux(&RemuxRequest {
//!         input: "source.mp4".into(),
//!         output: "Artist - Title.flac".into(),
//!         container: OutputContainer::Flac,
//!         metadata: vec![("title".into(), "Title".into())],
//!         cover: None,
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod engine;
mod error;
pub mod tools;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use engine::{FfmpegEngine, OutputContainer, RemuxRequest, TranscodeEngine};
pub use error::{Error, Result};
pub use tools::{check_tool_with_arg, check_tools, get_tool_path, ToolInfo};
pub use workspace::Workspace;
