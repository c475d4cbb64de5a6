//! trackforged-media: stream manifest decoding and MP4 tag patching.
//!
//! This crate holds the byte-exact parts of trackforged. Nothing here performs
//! I/O; every function works on in-memory strings and buffers.
//!
//! # Modules
//!
//! - [`dash`] - Decode BTS/DASH manifests and expand them into ordered segment plans
//! - [`mp4`] - Locate `moov/udta/meta/ilst` and splice in freeform `----` tag atoms
//!
//! # Example
//!
//! ```
//! use trackforged_media::dash::{build_segment_plan, decode_manifest, MIME_BTS};
//!
//! // base64 of {"urls":["http://x/seg"]}
//! let manifest = decode_manifest("eyJ1cmxzIjpbImh0dHA6Ly94L3NlZyJdfQ==", MIME_BTS)?;
//! let plan = build_segment_plan(&manifest);
//! assert_eq!(plan.urls, vec!["https://x/seg"]);
//! # Ok::<(), trackforged_media::Error>(())
//! ```

pub mod dash;
pub mod error;
pub mod mp4;

pub use dash::{build_segment_plan, decode_manifest, Manifest, ManifestSource, SegmentPlan, TransportKind};
pub use error::{Error, Result};
pub use mp4::{inject_tags, read_custom_tags, CustomTag};
