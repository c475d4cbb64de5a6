//! Ordered fetch plans derived from a [`Manifest`].

use super::{Manifest, ManifestSource};

/// Token replaced by the segment index in a media URL template.
pub const NUMBER_PLACEHOLDER: &str = "$Number$";

/// The URLs to fetch, in concatenation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    pub urls: Vec<String>,
}

impl SegmentPlan {
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Expand a manifest into its ordered list of segment URLs.
///
/// A direct file yields a single URL. A template yields `segment_count` URLs
/// where entry `i` substitutes `i` for `$Number$`, except that entry 0 is the
/// explicit initialization URL when the manifest carries one.
pub fn build_segment_plan(manifest: &Manifest) -> SegmentPlan {
    let urls = match &manifest.source {
        ManifestSource::DirectFile { url } => vec![url.clone()],
        ManifestSource::SegmentedTemplate {
            initialization_url,
            media_url_template,
            segment_count,
        } => (0..*segment_count)
            .map(|i| match (i, initialization_url) {
                (0, Some(init)) => init.clone(),
                _ => media_url_template.replace(NUMBER_PLACEHOLDER, &i.to_string()),
            })
            .collect(),
    };

    SegmentPlan { urls }
}
