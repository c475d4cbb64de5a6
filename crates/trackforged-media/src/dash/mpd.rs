//! Narrow MPD extractor.
//!
//! Only three constructs are interpreted: `BaseURL`, the attributes
//! `media`/`initialization` of the first `SegmentTemplate`, and the `r`
//! repeat counts of its `SegmentTimeline/S` children. Everything else in the
//! document is ignored.

use roxmltree::{Document, Node};

use crate::{Error, Result};

/// The parts of an MPD document the downloader cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MpdSummary {
    /// First non-empty `BaseURL` directly under the root or a `Representation`.
    pub base_url: Option<String>,
    /// The first `SegmentTemplate` in document order.
    pub template: Option<TemplateSummary>,
}

/// Attributes of a `SegmentTemplate` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSummary {
    pub media: Option<String>,
    pub initialization: Option<String>,
    /// Sum of every positive `r` attribute on `SegmentTimeline/S`.
    pub repeat_total: u64,
}

/// Parse `xml` and pull out the [`MpdSummary`].
pub fn extract(xml: &str) -> Result<MpdSummary> {
    let doc = Document::parse(xml).map_err(|e| Error::manifest(format!("invalid MPD XML: {e}")))?;
    let root = doc.root_element();

    Ok(MpdSummary {
        base_url: find_base_url(root),
        template: root
            .descendants()
            .find(|n| is_element(n, "SegmentTemplate"))
            .map(summarize_template),
    })
}

fn is_element(node: &Node<'_, '_>, local_name: &str) -> bool {
    node.is_element() && node.tag_name().name() == local_name
}

fn base_url_child(parent: Node<'_, '_>) -> Option<String> {
    parent
        .children()
        .filter(|n| is_element(n, "BaseURL"))
        .filter_map(|n| n.text())
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

fn find_base_url(root: Node<'_, '_>) -> Option<String> {
    base_url_child(root).or_else(|| {
        root.descendants()
            .filter(|n| is_element(n, "Representation"))
            .find_map(base_url_child)
    })
}

fn summarize_template(template: Node<'_, '_>) -> TemplateSummary {
    let repeat_total = template
        .children()
        .filter(|n| is_element(n, "SegmentTimeline"))
        .flat_map(|timeline| timeline.children())
        .filter(|n| is_element(n, "S"))
        .filter_map(|s| s.attribute("r"))
        .filter_map(|r| r.trim().parse::<i64>().ok())
        .filter(|&r| r > 0)
        .map(|r| r as u64)
        .fold(0u64, u64::saturating_add);

    TemplateSummary {
        media: non_empty(template.attribute("media")),
        initialization: non_empty(template.attribute("initialization")),
        repeat_total,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
