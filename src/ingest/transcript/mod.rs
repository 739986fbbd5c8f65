
use std::sync::LazyLock;

use fancy_regex::Regex;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::http::HttpClient;
use crate::{RagError, Result};

/// Watch page queried with `v=<id>`; its player data lists the caption tracks
pub const DEFAULT_WATCH_ENDPOINT: &str = "https://www.youtube.com/watch";

const CAPTION_TRACKS_KEY: &str = "\"captionTracks\":";
const PREFERRED_LANGUAGE: &str = "en";

static VIDEO_ID: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/)([A-Za-z0-9_-]+)").ok()
});

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    /// Seconds from the start of the video
    pub start: f64,
    pub duration: f64,
    pub text: String,
}

/// Video id from `watch?v=ID`, `youtu.be/ID`, `/shorts/ID` or `/embed/ID` URLs
#[inline]
pub fn extract_video_id(url: &str) -> Option<String> {
    let regex = VIDEO_ID.as_ref()?;
    let captures = regex.captures(url).ok().flatten()?;
    captures.get(1).map(|m| m.as_str().to_string())
}

/// One caption track advertised by the watch page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    #[serde(default)]
    pub language_code: String,
}

/// Fetch a video's transcript, preferring English captions, and join its
/// segments with spaces.
///
/// The watch page at `watch_endpoint` is fetched first to find the caption
/// tracks, then the chosen track's timed-text XML.
#[inline]
pub fn fetch_transcript(
    http: &HttpClient,
    watch_endpoint: &str,
    video_id: &str,
) -> Result<String> {
    let mut watch_url = Url::parse(watch_endpoint).map_err(|e| {
        RagError::Load(format!("invalid watch page endpoint '{watch_endpoint}': {e}"))
    })?;
    watch_url
        .query_pairs_mut()
        .append_pair("v", video_id)
        .append_pair("hl", PREFERRED_LANGUAGE);

    let page = http.get_text(&watch_url).map_err(|e| {
        RagError::Load(format!("failed to fetch watch page for {video_id}: {e:#}"))
    })?;
    let tracks = caption_tracks(&page)?;
    let track = choose_track(&tracks).ok_or_else(|| {
        warn!("No caption tracks for video {}", video_id);
        RagError::Load(format!("no transcript available for video {video_id}"))
    })?;
    debug!(
        "Using {} caption track for {} ({} available)",
        track.language_code,
        video_id,
        tracks.len()
    );

    let track_url = watch_url
        .join(&track.base_url)
        .map_err(|e| RagError::Load(format!("invalid caption track url: {e}")))?;
    let body = http.get_text(&track_url).map_err(|e| {
        RagError::Load(format!("failed to fetch transcript for {video_id}: {e:#}"))
    })?;

    let segments = parse_transcript(&body)?;
    let text = join_segments(&segments);
    if text.is_empty() {
        warn!("Empty transcript for video {}", video_id);
        return Err(RagError::Load(format!(
            "no transcript available for video {video_id}"
        )));
    }

    debug!(
        "Fetched transcript for {} ({} segments, {} chars)",
        video_id,
        segments.len(),
        text.len()
    );
    Ok(text)
}

/// Caption tracks embedded in a watch page's player data.
/// A page without captions yields an empty list.
#[inline]
pub fn caption_tracks(page: &str) -> Result<Vec<CaptionTrack>> {
    let Some((_, rest)) = page.split_once(CAPTION_TRACKS_KEY) else {
        return Ok(Vec::new());
    };
    serde_json::Deserializer::from_str(rest)
        .into_iter::<Vec<CaptionTrack>>()
        .next()
        .transpose()
        .map_err(|e| RagError::Load(format!("malformed caption track list: {e}")))
        .map(Option::unwrap_or_default)
}

fn choose_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    tracks
        .iter()
        .find(|track| track.language_code == PREFERRED_LANGUAGE)
        .or_else(|| {
            tracks
                .iter()
                .find(|track| track.language_code.starts_with(PREFERRED_LANGUAGE))
        })
        .or_else(|| tracks.first())
}

#[inline]
pub fn parse_transcript(xml: &str) -> Result<Vec<TranscriptSegment>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut segments = Vec::new();
    let mut current: Option<TranscriptSegment> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"text" => {
                current = Some(TranscriptSegment {
                    start: numeric_attribute(&e, "start"),
                    duration: numeric_attribute(&e, "dur"),
                    text: String::new(),
                });
            }
            Ok(Event::Text(text)) => {
                if let Some(segment) = current.as_mut() {
                    let once = text
                        .unescape()
                        .map_err(|e| RagError::Load(format!("malformed transcript: {e}")))?;
                    // Captions are often escaped twice (`&amp;#39;`)
                    let twice = quick_xml::escape::unescape(&once)
                        .map_or_else(|_| once.to_string(), |s| s.into_owned());
                    segment.text.push_str(&twice);
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"text" => {
                if let Some(segment) = current.take() {
                    segments.push(segment);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(RagError::Load(format!("malformed transcript: {e}")));
            }
            Ok(_) => {}
        }
    }

    Ok(segments)
}

fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|segment| segment.text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn numeric_attribute(element: &quick_xml::events::BytesStart<'_>, name: &str) -> f64 {
    element
        .try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok()?.parse().ok())
        .unwrap_or_default()
}
