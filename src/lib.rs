//! # trackforged
//!
//! Downloads tracks delivered as BTS or DASH manifests, remuxes them with
//! ffmpeg and patches ReplayGain tags into M4A output.
//!
//! The byte-level pieces live in `trackforged-media` (manifest decoding,
//! segment plans, `ilst` atom patching) and `trackforged-av` (ffmpeg and
//! scratch workspaces). This crate wires them to the network:
//!
//! - [`fetch`]: the HTTP fetch seam
//! - [`assembler`]: ordered segment assembly, sequential or in batches
//! - [`resolver`]: stream-info lookup through the authenticating proxy
//! - [`download`]: per-track and batch orchestration
//! - [`context`]: the collaborators one session shares

pub mod assembler;
pub mod config;
pub mod context;
pub mod download;
pub mod error;
pub mod fetch;
pub mod resolver;
pub mod tags;

pub use error::{Error, Result};
