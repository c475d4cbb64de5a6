//! Segment assembly.
//!
//! Turns a [`SegmentPlan`] into one contiguous buffer. Output bytes are
//! always in plan order: in parallel mode each fetch writes into its own
//! index-addressed slot and the slots are concatenated only after every
//! batch has finished.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use trackforged_media::SegmentPlan;

use crate::error::{Error, Result};
use crate::fetch::{FetchError, Fetcher};

/// Preallocation cap when trusting a server's `Content-Length`.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// How many segment fetches may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// One fetch at a time, with byte-level progress.
    #[default]
    Sequential,
    /// Fixed-size batches of concurrent fetches.
    Parallel(NonZeroUsize),
}

impl Concurrency {
    /// `0` or `1` worker means sequential; anything larger is a batch size.
    pub fn from_workers(workers: usize) -> Self {
        match NonZeroUsize::new(workers) {
            Some(n) if n.get() > 1 => Concurrency::Parallel(n),
            _ => Concurrency::Sequential,
        }
    }
}

/// The slice of an overall progress bar this assembly reports into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressWindow {
    pub start: f64,
    pub end: f64,
}

impl Default for ProgressWindow {
    fn default() -> Self {
        Self { start: 0.0, end: 1.0 }
    }
}

impl ProgressWindow {
    /// Map a 0..=1 fraction of this assembly into the caller's scale.
    pub fn scale(&self, fraction: f64) -> f64 {
        self.start + (self.end - self.start) * fraction.clamp(0.0, 1.0)
    }
}

/// A progress update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Position within the caller's progress window.
    Fraction(f64),
    /// No total is known; only a running byte count.
    Indeterminate { bytes_received: u64 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleOptions {
    pub concurrency: Concurrency,
    pub window: ProgressWindow,
}

/// The concatenated encoded stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledStream {
    pub bytes: Bytes,
}

impl AssembledStream {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Fetches every URL of a plan and concatenates the bodies.
#[derive(Clone)]
pub struct SegmentAssembler {
    fetcher: Arc<dyn Fetcher>,
}

impl SegmentAssembler {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch and concatenate all segments of `plan`.
    ///
    /// # Errors
    ///
    /// The first failing segment (lowest index within its batch) aborts the
    /// whole assembly with [`Error::SegmentFetch`]; no partial output is
    /// returned.
    pub async fn assemble(
        &self,
        plan: &SegmentPlan,
        options: &AssembleOptions,
        progress: &(dyn Fn(Progress) + Send + Sync),
    ) -> Result<AssembledStream> {
        tracing::debug!(
            "assembling {} segment(s) with {:?}",
            plan.len(),
            options.concurrency
        );

        let bytes = match options.concurrency {
            Concurrency::Sequential => self.assemble_sequential(plan, options.window, progress).await?,
            Concurrency::Parallel(workers) => {
                self.assemble_parallel(plan, workers.get(), options.window, progress)
                    .await?
            }
        };

        tracing::debug!("assembled {} bytes", bytes.len());
        Ok(AssembledStream { bytes })
    }

    async fn assemble_sequential(
        &self,
        plan: &SegmentPlan,
        window: ProgressWindow,
        progress: &(dyn Fn(Progress) + Send + Sync),
    ) -> Result<Bytes> {
        let total = plan.len();
        let mut accumulated = BytesMut::new();

        for (index, url) in plan.urls.iter().enumerate() {
            let already = accumulated.len() as u64;
            let segment = self
                .fetch_segment(index, url, |received, declared| {
                    progress(sequential_progress(window, index, total, already, received, declared));
                })
                .await?;
            accumulated.extend_from_slice(&segment);

            if total > 1 {
                progress(Progress::Fraction(window.scale((index + 1) as f64 / total as f64)));
            }
        }

        Ok(accumulated.freeze())
    }

    async fn assemble_parallel(
        &self,
        plan: &SegmentPlan,
        workers: usize,
        window: ProgressWindow,
        progress: &(dyn Fn(Progress) + Send + Sync),
    ) -> Result<Bytes> {
        let total = plan.len();
        let mut slots = vec![Bytes::new(); total];
        let mut completed = 0usize;

        for (batch_no, batch) in plan.urls.chunks(workers).enumerate() {
            let base = batch_no * workers;
            let fetches = batch.iter().enumerate().map(|(offset, url)| {
                let index = base + offset;
                async move { (index, self.fetch_segment(index, url, |_, _| {}).await) }
            });

            // The whole batch settles before any result is inspected.
            for (index, result) in futures::future::join_all(fetches).await {
                slots[index] = result?;
            }

            completed += batch.len();
            progress(Progress::Fraction(window.scale(completed as f64 / total as f64)));
        }

        let mut out = BytesMut::with_capacity(slots.iter().map(Bytes::len).sum());
        for slot in &slots {
            out.extend_from_slice(slot);
        }
        Ok(out.freeze())
    }

    /// Fetch one segment fully, reporting `(received, declared)` per chunk.
    async fn fetch_segment(
        &self,
        index: usize,
        url: &str,
        mut on_chunk: impl FnMut(u64, Option<u64>) + Send,
    ) -> Result<Bytes> {
        let fail = |cause: FetchError| Error::segment_fetch(index, url, cause);

        let response = self.fetcher.fetch(url).await.map_err(fail)?;
        let declared = response.content_length;
        let mut body = response.body;
        let mut buf = BytesMut::with_capacity(declared.unwrap_or(0).min(MAX_PREALLOCATION) as usize);

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(fail)?;
            buf.extend_from_slice(&chunk);
            on_chunk(buf.len() as u64, declared);
        }

        let received = buf.len() as u64;
        if let Some(expected) = declared {
            if received < expected {
                return Err(fail(FetchError::Truncated { expected, received }));
            }
        }

        tracing::trace!("segment {index}: {received} bytes from {url}");
        Ok(buf.freeze())
    }
}

/// Progress for segment `index` of `total`, `received` bytes into it.
fn sequential_progress(
    window: ProgressWindow,
    index: usize,
    total: usize,
    already: u64,
    received: u64,
    declared: Option<u64>,
) -> Progress {
    match declared {
        Some(len) if len > 0 => {
            let within = received as f64 / len as f64;
            Progress::Fraction(window.scale((index as f64 + within) / total as f64))
        }
        _ if total > 1 => Progress::Fraction(window.scale(index as f64 / total as f64)),
        _ => Progress::Indeterminate {
            bytes_received: already + received,
        },
    }
}
