//! Track metadata and its split between engine and atom patcher.

use serde::Deserialize;

pub const TRACK_GAIN: &str = "REPLAYGAIN_TRACK_GAIN";
pub const TRACK_PEAK: &str = "REPLAYGAIN_TRACK_PEAK";
pub const ALBUM_GAIN: &str = "REPLAYGAIN_ALBUM_GAIN";
pub const ALBUM_PEAK: &str = "REPLAYGAIN_ALBUM_PEAK";

/// Image host serving album artwork by cover id.
const COVER_HOST: &str = "https://resources.tidal.com/images";

/// Loudness normalization values; any subset may be known.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayGain {
    pub track_gain: Option<f64>,
    pub track_peak: Option<f64>,
    pub album_gain: Option<f64>,
    pub album_peak: Option<f64>,
}

impl ReplayGain {
    pub fn is_empty(&self) -> bool {
        self.tags().is_empty()
    }

    /// Formatted `(key, value)` pairs for the known values.
    pub fn tags(&self) -> Vec<(&'static str, String)> {
        let gain = |v: f64| format!("{:.2} dB", v);
        let peak = |v: f64| format!("{:.6}", v);

        [
            (TRACK_GAIN, self.track_gain.map(gain)),
            (TRACK_PEAK, self.track_peak.map(peak)),
            (ALBUM_GAIN, self.album_gain.map(gain)),
            (ALBUM_PEAK, self.album_peak.map(peak)),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

/// Descriptive metadata for one track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub date: Option<String>,
    pub isrc: Option<String>,
    pub copyright: Option<String>,
    /// Album artwork to embed, if the catalog has any.
    pub cover_url: Option<String>,
}

impl TrackMetadata {
    /// Pairs the engine's `-metadata key=value` interface carries reliably.
    pub fn standard_tags(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                out.push((key.to_string(), v));
            }
        };

        push("title", self.title.clone());
        push("artist", self.artist.clone());
        push("album", self.album.clone());
        push("album_artist", self.album_artist.clone());
        push("track", self.track_number.map(|n| n.to_string()));
        push("disc", self.disc_number.map(|n| n.to_string()));
        push("date", self.date.clone());
        push("isrc", self.isrc.clone());
        push("copyright", self.copyright.clone());
        out
    }

    /// `"{artist} - {title}.{ext}"`, falling back to `"{track_id}.{ext}"`.
    pub fn file_name(&self, track_id: u64, extension: &str) -> String {
        let stem = match (&self.artist, &self.title) {
            (Some(artist), Some(title)) if !artist.is_empty() && !title.is_empty() => {
                format!("{} - {}", artist, title)
            }
            _ => track_id.to_string(),
        };
        format!("{}.{}", sanitize_file_name(&stem), extension)
    }
}

/// 1280px artwork URL for a catalog cover id.
///
/// Cover ids are UUIDs whose dashes become path separators on the image host.
pub fn cover_url(cover_id: &str) -> Option<String> {
    let id = cover_id.trim();
    if id.is_empty() {
        return None;
    }
    Some(format!("{}/{}/1280x1280.jpg", COVER_HOST, id.replace('-', "/")))
}

/// Replace characters that are unsafe in file names on common filesystems.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim().trim_end_matches('.').to_string()
}

/// Track as returned by the catalog's `tracks/{id}` route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTrack {
    pub title: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub volume_number: Option<u32>,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub artist: Option<CatalogName>,
    #[serde(default)]
    pub artists: Vec<CatalogName>,
    #[serde(default)]
    pub album: Option<CatalogAlbum>,
    #[serde(default)]
    pub stream_start_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogName {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogAlbum {
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
}

impl From<CatalogTrack> for TrackMetadata {
    fn from(track: CatalogTrack) -> Self {
        let title = match track.version.filter(|v| !v.is_empty()) {
            Some(version) => format!("{} ({})", track.title, version),
            None => track.title,
        };
        let artist = if track.artists.is_empty() {
            track.artist.map(|a| a.name)
        } else {
            Some(
                track
                    .artists
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        };
        let album_artist = track
            .artists
            .first()
            .map(|a| a.name.clone())
            .or_else(|| artist.clone());
        let (album, release_date, cover) = match track.album {
            Some(album) => (
                Some(album.title),
                album.release_date,
                album.cover.as_deref().and_then(cover_url),
            ),
            None => (None, None, None),
        };

        TrackMetadata {
            title: Some(title),
            artist,
            album,
            album_artist,
            track_number: track.track_number,
            disc_number: track.volume_number,
            date: release_date.or(track.stream_start_date),
            isrc: track.isrc,
            copyright: track.copyright,
            cover_url: cover,
        }
    }
}
