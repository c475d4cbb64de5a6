//! Stream manifest decoding and segment planning.
//!
//! The stream-info endpoint hands back an opaque, base64-encoded manifest
//! together with its MIME type. Two encodings are understood:
//!
//! - `application/vnd.tidal.bts`: a JSON object with a `urls` array; the
//!   first URL is the whole file.
//! - `application/dash+xml`: an MPD document, of which only `BaseURL`,
//!   `SegmentTemplate` and `SegmentTimeline/S@r` are read (see [`mpd`]).
//!
//! Every URL that comes out of decoding has its scheme forced to `https://`.

pub mod mpd;
mod plan;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::{Error, Result};

pub use plan::{build_segment_plan, SegmentPlan, NUMBER_PLACEHOLDER};

/// MIME type of the JSON direct-URL manifest.
pub const MIME_BTS: &str = "application/vnd.tidal.bts";

/// MIME type of the DASH MPD manifest.
pub const MIME_DASH: &str = "application/dash+xml";

/// Upper bound on segments per track; a real track has a few hundred at most.
pub const MAX_SEGMENTS: u64 = 100_000;

/// Which of the two manifest shapes was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    DirectFile,
    SegmentedTemplate,
}

/// Where the encoded audio lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// One URL holds the entire stream.
    DirectFile { url: String },
    /// Numbered segments produced by substituting `$Number$` in a template.
    SegmentedTemplate {
        initialization_url: Option<String>,
        media_url_template: String,
        segment_count: u32,
    },
}

/// A decoded manifest for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// MIME type of the manifest payload itself.
    pub mime_type: String,
    /// Codec string when the manifest declares one (BTS only).
    pub codecs: Option<String>,
    pub source: ManifestSource,
}

impl Manifest {
    pub fn transport_kind(&self) -> TransportKind {
        match self.source {
            ManifestSource::DirectFile { .. } => TransportKind::DirectFile,
            ManifestSource::SegmentedTemplate { .. } => TransportKind::SegmentedTemplate,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BtsManifest {
    #[serde(default)]
    codecs: Option<String>,
    #[serde(default)]
    encryption_type: Option<String>,
    urls: Vec<String>,
}

/// Decode a base64 manifest payload according to its MIME type.
///
/// # Errors
///
/// Returns [`Error::ManifestDecode`] for an unknown MIME type, invalid
/// base64/UTF-8/JSON/XML, an encrypted BTS stream, or a manifest that names
/// no URL at all.
pub fn decode_manifest(payload: &str, mime_type: &str) -> Result<Manifest> {
    let text = decode_base64_text(payload)?;

    let (codecs, source) = match mime_type {
        MIME_BTS => decode_bts(&text)?,
        MIME_DASH => (None, decode_mpd(&text)?),
        other => {
            return Err(Error::manifest(format!("unsupported manifest MIME type '{other}'")));
        }
    };

    let manifest = Manifest {
        mime_type: mime_type.to_string(),
        codecs,
        source,
    };
    tracing::debug!("decoded {} manifest as {:?}", mime_type, manifest.transport_kind());
    Ok(manifest)
}

fn decode_base64_text(payload: &str) -> Result<String> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::manifest(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::manifest(format!("manifest is not UTF-8: {e}")))
}

fn decode_bts(text: &str) -> Result<(Option<String>, ManifestSource)> {
    let bts: BtsManifest =
        serde_json::from_str(text).map_err(|e| Error::manifest(format!("invalid BTS JSON: {e}")))?;

    if let Some(encryption) = bts.encryption_type.as_deref() {
        if !encryption.eq_ignore_ascii_case("NONE") {
            return Err(Error::manifest(format!("encrypted stream ({encryption}) is not supported")));
        }
    }

    let url = bts
        .urls
        .into_iter()
        .next()
        .ok_or_else(|| Error::manifest("BTS manifest has no urls"))?;

    Ok((bts.codecs, ManifestSource::DirectFile { url: force_https(&url) }))
}

fn decode_mpd(text: &str) -> Result<ManifestSource> {
    let summary = mpd::extract(text)?;

    if let Some(url) = summary.base_url {
        return Ok(ManifestSource::DirectFile { url: force_https(&url) });
    }

    let template = summary
        .template
        .ok_or_else(|| Error::manifest("MPD has neither BaseURL nor SegmentTemplate"))?;

    match (template.media, template.initialization) {
        (Some(media), initialization) if media.contains(NUMBER_PLACEHOLDER) => {
            // Initialization plus first media segment, then one per repeat.
            let segment_count = template
                .repeat_total
                .checked_add(2)
                .filter(|&n| n <= MAX_SEGMENTS)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    Error::manifest(format!(
                        "SegmentTimeline repeats {} times; at most {} segments are supported",
                        template.repeat_total, MAX_SEGMENTS
                    ))
                })?;
            Ok(ManifestSource::SegmentedTemplate {
                initialization_url: initialization.as_deref().map(force_https),
                media_url_template: force_https(&media),
                segment_count,
            })
        }
        (Some(media), _) => Ok(ManifestSource::DirectFile { url: force_https(&media) }),
        (None, Some(initialization)) => Ok(ManifestSource::DirectFile {
            url: force_https(&initialization),
        }),
        (None, None) => Err(Error::manifest(
            "SegmentTemplate has neither media nor initialization",
        )),
    }
}

/// Rewrite an `http://` scheme to `https://`; other URLs pass through.
pub fn force_https(url: &str) -> String {
    const INSECURE: &str = "http://";
    match url.get(..INSECURE.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(INSECURE) => {
            format!("https://{}", &url[INSECURE.len()..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(text: &str) -> String {
        STANDARD.encode(text)
    }

    #[test]
    fn test_bts_direct_file() {
        let manifest = decode_manifest(&b64(r#"{"urls":["http://x/seg"]}"#), MIME_BTS).unwrap();
        assert_eq!(manifest.transport_kind(), TransportKind::DirectFile);
        assert_eq!(
            manifest.source,
            ManifestSource::DirectFile {
                url: "https://x/seg".to_string()
            }
        );
        assert_eq!(manifest.mime_type, MIME_BTS);
    }

    #[test]
    fn test_bts_reads_codecs_and_first_url() {
        let json = r#"{"mimeType":"audio/mp4","codecs":"mp4a.40.2","encryptionType":"NONE",
            "urls":["https://a/1.m4a","https://b/2.m4a"]}"#;
        let manifest = decode_manifest(&b64(json), MIME_BTS).unwrap();
        assert_eq!(manifest.codecs.as_deref(), Some("mp4a.40.2"));
        assert_eq!(
            manifest.source,
            ManifestSource::DirectFile {
                url: "https://a/1.m4a".to_string()
            }
        );
    }

    #[test]
    fn test_bts_rejects_encrypted() {
        let json = r#"{"encryptionType":"OLD_AES","urls":["https://a"]}"#;
        let err = decode_manifest(&b64(json), MIME_BTS).unwrap_err();
        assert!(err.to_string().contains("encrypted"));
    }

    #[test]
    fn test_bts_rejects_empty_urls() {
        let err = decode_manifest(&b64(r#"{"urls":[]}"#), MIME_BTS).unwrap_err();
        assert!(matches!(err, Error::ManifestDecode(_)));
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let encoded = b64(r#"{"urls":["https://x/y"]}"#);
        let (head, tail) = encoded.split_at(10);
        let wrapped = format!("{head}\n  {tail}\r\n");
        assert!(decode_manifest(&wrapped, MIME_BTS).is_ok());
    }

    #[test]
    fn test_invalid_base64() {
        let err = decode_manifest("!!!not base64!!!", MIME_BTS).unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_invalid_utf8() {
        let err = decode_manifest(&STANDARD.encode([0xFF, 0xFE, 0x00]), MIME_DASH).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_unknown_mime_type() {
        let err = decode_manifest(&b64("{}"), "application/vnd.apple.mpegurl").unwrap_err();
        assert!(matches!(err, Error::ManifestDecode(_)));
    }

    #[test]
    fn test_dash_segment_count_formula() {
        let xml = r#"<MPD><Period><AdaptationSet><Representation>
            <SegmentTemplate initialization="http://cdn/0.mp4" media="http://cdn/$Number$.mp4" startNumber="1">
              <SegmentTimeline><S d="1" r="0"/><S d="1" r="3"/><S d="1" r="0"/><S d="1" r="5"/></SegmentTimeline>
            </SegmentTemplate>
        </Representation></AdaptationSet></Period></MPD>"#;
        let manifest = decode_manifest(&b64(xml), MIME_DASH).unwrap();
        assert_eq!(
            manifest.source,
            ManifestSource::SegmentedTemplate {
                initialization_url: Some("https://cdn/0.mp4".to_string()),
                media_url_template: "https://cdn/$Number$.mp4".to_string(),
                segment_count: 10,
            }
        );
        assert_eq!(manifest.transport_kind(), TransportKind::SegmentedTemplate);
    }

    #[test]
    fn test_dash_oversized_repeat_rejected() {
        let xml = r#"<MPD><SegmentTemplate media="https://cdn/$Number$.mp4">
              <SegmentTimeline><S d="1" r="9999999999"/></SegmentTimeline>
            </SegmentTemplate></MPD>"#;
        let err = decode_manifest(&b64(xml), MIME_DASH).unwrap_err();
        assert!(matches!(err, Error::ManifestDecode(_)));
        assert!(err.to_string().contains("at most 100000 segments"));
    }

    #[test]
    fn test_dash_segment_count_at_bound() {
        let r = MAX_SEGMENTS - 2;
        let xml = format!(
            r#"<MPD><SegmentTemplate media="https://cdn/$Number$.mp4">
              <SegmentTimeline><S d="1" r="{r}"/></SegmentTimeline>
            </SegmentTemplate></MPD>"#
        );
        let manifest = decode_manifest(&b64(&xml), MIME_DASH).unwrap();
        assert!(matches!(
            manifest.source,
            ManifestSource::SegmentedTemplate { segment_count, .. } if segment_count as u64 == MAX_SEGMENTS
        ));

        let over = xml.replace(&format!("r=\"{r}\""), &format!("r=\"{}\"", r + 1));
        assert!(decode_manifest(&b64(&over), MIME_DASH).is_err());
    }

    #[test]
    fn test_dash_without_timeline_has_two_segments() {
        let xml = r#"<MPD><SegmentTemplate media="https://cdn/$Number$.mp4"/></MPD>"#;
        let manifest = decode_manifest(&b64(xml), MIME_DASH).unwrap();
        match manifest.source {
            ManifestSource::SegmentedTemplate {
                initialization_url,
                segment_count,
                ..
            } => {
                assert_eq!(initialization_url, None);
                assert_eq!(segment_count, 2);
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_dash_base_url_preferred_over_template() {
        let xml = r#"<MPD><BaseURL>http://cdn/full.flac</BaseURL>
            <SegmentTemplate media="https://cdn/$Number$.mp4"/></MPD>"#;
        let manifest = decode_manifest(&b64(xml), MIME_DASH).unwrap();
        assert_eq!(
            manifest.source,
            ManifestSource::DirectFile {
                url: "https://cdn/full.flac".to_string()
            }
        );
    }

    #[test]
    fn test_dash_media_without_placeholder() {
        let xml = r#"<MPD><SegmentTemplate initialization="https://cdn/init.mp4" media="http://cdn/whole.mp4"/></MPD>"#;
        let manifest = decode_manifest(&b64(xml), MIME_DASH).unwrap();
        assert_eq!(
            manifest.source,
            ManifestSource::DirectFile {
                url: "https://cdn/whole.mp4".to_string()
            }
        );
    }

    #[test]
    fn test_dash_initialization_fallback() {
        let xml = r#"<MPD><SegmentTemplate initialization="http://cdn/only.mp4"/></MPD>"#;
        let manifest = decode_manifest(&b64(xml), MIME_DASH).unwrap();
        assert_eq!(
            manifest.source,
            ManifestSource::DirectFile {
                url: "https://cdn/only.mp4".to_string()
            }
        );
    }

    #[test]
    fn test_dash_without_any_url_fails() {
        for xml in ["<MPD><Period/></MPD>", "<MPD><SegmentTemplate timescale=\"1\"/></MPD>"] {
            let err = decode_manifest(&b64(xml), MIME_DASH).unwrap_err();
            assert!(matches!(err, Error::ManifestDecode(_)), "{xml}");
        }
    }

    #[test]
    fn test_force_https() {
        assert_eq!(force_https("http://a/b"), "https://a/b");
        assert_eq!(force_https("HTTP://a/b"), "https://a/b");
        assert_eq!(force_https("https://a/b"), "https://a/b");
        assert_eq!(force_https("ftp://a"), "ftp://a");
        assert_eq!(force_https("http"), "http");
    }
}
