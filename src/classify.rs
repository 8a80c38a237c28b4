//! Content classification.
//!
//! Maps free-form input to a [`ContentCategory`] with an ordered rule list.
//! The first matching rule wins, so a video file hosted on a social domain
//! still lands in `Media` and a YouTube link lands in `Audio`.

use lazy_static::lazy_static;
use phf::phf_map;
use regex::Regex;

use crate::category::{AnalysisRequest, ContentCategory, MediaKind};

/// Domains served by the audio engine.
const AUDIO_HOSTS: &[&str] = &["youtube.com", "youtu.be", "spotify.com", "soundcloud.com"];

/// Social image/video domains and CDNs served by the media engine.
const MEDIA_HOSTS: &[&str] = &["instagram.com", "facebook.com", "fbcdn", "tiktok.com"];

/// Platform labels forwarded to the audio engine, keyed by domain fragment.
static PLATFORMS: phf::Map<&'static str, &'static str> = phf_map! {
    "youtube.com" => "YouTube",
    "youtu.be" => "YouTube",
    "instagram.com" => "Instagram",
    "cdninstagram" => "Instagram",
    "facebook.com" => "Facebook",
    "fbcdn" => "Facebook",
    "tiktok.com" => "TikTok",
    "spotify.com" => "Spotify",
};

/// Lookup order for [`PLATFORMS`]; phf maps do not preserve insertion order.
const PLATFORM_ORDER: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "instagram.com",
    "cdninstagram",
    "facebook.com",
    "fbcdn",
    "tiktok.com",
    "spotify.com",
];

/// Label used when no known platform matches.
pub const DIRECT_UPLOAD: &str = "Direct Upload";

lazy_static! {
    static ref AUDIO_EXT: Regex = Regex::new(r"\.(mp3|wav|ogg|m4a|aac|flac)(\?|$)").unwrap();
    static ref IMAGE_EXT: Regex = Regex::new(r"\.(jpg|jpeg|png|gif|webp|bmp|svg)(\?|$)").unwrap();
    static ref VIDEO_EXT: Regex = Regex::new(r"\.(mp4|mov|avi|mkv|webm)(\?|$)").unwrap();
    static ref ABSOLUTE_URL: Regex = Regex::new(r"^https?://[^\s/?#]+\S*$").unwrap();
}

/// Classify a request. An explicit hint always wins.
pub fn classify(request: &AnalysisRequest) -> ContentCategory {
    match request.category_hint {
        Some(hint) => hint,
        None => classify_content(&request.raw_content),
    }
}

/// Classify raw content by pattern rules alone.
pub fn classify_content(raw: &str) -> ContentCategory {
    let text = raw.trim().to_lowercase();

    if AUDIO_HOSTS.iter().any(|h| text.contains(h)) || AUDIO_EXT.is_match(&text) {
        return ContentCategory::Audio;
    }

    if MEDIA_HOSTS.iter().any(|h| text.contains(h))
        || IMAGE_EXT.is_match(&text)
        || VIDEO_EXT.is_match(&text)
    {
        return ContentCategory::Media;
    }

    if is_absolute_url(&text) {
        return ContentCategory::Tool;
    }

    ContentCategory::News
}

/// Whether the text is a single absolute http(s) URL.
pub fn is_absolute_url(text: &str) -> bool {
    ABSOLUTE_URL.is_match(text)
}

/// Resolve the media kind for a media request: the explicit kind if given,
/// otherwise a video extension means video and anything else an image.
pub fn infer_media_kind(request: &AnalysisRequest) -> MediaKind {
    if let Some(kind) = request.media_kind {
        return kind;
    }
    if VIDEO_EXT.is_match(&request.raw_content.trim().to_lowercase()) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

/// Detect the hosting platform of an audio source.
pub fn detect_platform(raw: &str) -> &'static str {
    let text = raw.to_lowercase();
    PLATFORM_ORDER
        .iter()
        .find(|key| text.contains(*key))
        .and_then(|key| PLATFORMS.get(*key).copied())
        .unwrap_or(DIRECT_UPLOAD)
}
