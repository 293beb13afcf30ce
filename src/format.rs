#![forbid(unsafe_code)]

//! Quality tiers and the format selector.
//!
//! The selector only looks at metadata the extractor already computed. It
//! never invents a record: whatever comes back is one of the inputs.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

const UHD_HEIGHT: i64 = 2160;
const QHD_HEIGHT: i64 = 1440;
const FHD_HEIGHT: i64 = 1080;
const HD_HEIGHT: i64 = 720;

/// One downloadable stream as reported by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec_video: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec_audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_audio: Option<f64>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    pub note: String,
}

impl FormatRecord {
    fn is_audio(&self) -> bool {
        self.codec_audio.is_some()
    }

    /// Video-capable records need both a codec and a known height.
    fn video_height(&self) -> Option<i64> {
        self.codec_video.as_ref().and(self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityTier {
    Highest,
    Uhd4k,
    Qhd1440p,
    Fhd1080p,
    Hd720p,
    AudioOnly,
}

impl QualityTier {
    /// Parses the request string. Unknown values fall back to `Highest`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "4k" => Self::Uhd4k,
            "1440p" => Self::Qhd1440p,
            "1080p" => Self::Fhd1080p,
            "720p" => Self::Hd720p,
            "audio" => Self::AudioOnly,
            _ => Self::Highest,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Highest => "highest",
            Self::Uhd4k => "4k",
            Self::Qhd1440p => "1440p",
            Self::Fhd1080p => "1080p",
            Self::Hd720p => "720p",
            Self::AudioOnly => "audio",
        }
    }

    /// Inclusive lower and exclusive upper height bound for the tier.
    fn height_band(self) -> Option<(i64, Option<i64>)> {
        match self {
            Self::Uhd4k => Some((UHD_HEIGHT, None)),
            Self::Qhd1440p => Some((QHD_HEIGHT, Some(UHD_HEIGHT))),
            Self::Fhd1080p => Some((FHD_HEIGHT, Some(QHD_HEIGHT))),
            Self::Hd720p => Some((HD_HEIGHT, Some(FHD_HEIGHT))),
            Self::Highest | Self::AudioOnly => None,
        }
    }

    /// Format expression handed to yt-dlp when the server downloads itself.
    pub fn format_selector(self) -> String {
        match self {
            Self::Highest => [
                "bestvideo[height>=2160][ext=mp4]+bestaudio[ext=m4a]",
                "bestvideo[height>=1440][ext=mp4]+bestaudio[ext=m4a]",
                "bestvideo[height>=1080][ext=mp4]+bestaudio[ext=m4a]",
                "bestvideo[ext=mp4]+bestaudio[ext=m4a]",
                "best[ext=mp4]",
                "bestvideo+bestaudio",
                "best",
            ]
            .join("/"),
            Self::AudioOnly => "bestaudio[ext=m4a]/bestaudio/best[acodec=mp3]/best".to_string(),
            tier => {
                let filter = match tier.height_band() {
                    Some((low, Some(high))) => format!("[height>={low}][height<{high}]"),
                    Some((low, None)) => format!("[height>={low}]"),
                    None => String::new(),
                };
                format!(
                    "bestvideo{filter}[ext=mp4]+bestaudio[ext=m4a]/bestvideo{filter}+bestaudio/best{filter}/best"
                )
            }
        }
    }

    /// Container used when audio and video streams get merged.
    pub fn merge_format(self) -> &'static str {
        match self {
            Self::AudioOnly => "m4a",
            _ => "mp4",
        }
    }
}

/// Picks the record that best matches `tier`, or `None` when nothing fits.
///
/// Ties on height or bitrate resolve to the first record in input order.
pub fn select(formats: &[FormatRecord], tier: QualityTier) -> Option<&FormatRecord> {
    let chosen = if tier == QualityTier::AudioOnly {
        first_max_by(formats.iter().filter(|f| f.is_audio()), |f| {
            f.bitrate_audio.unwrap_or(0.0)
        })
    } else {
        let video: Vec<(&FormatRecord, i64)> = formats
            .iter()
            .filter_map(|f| f.video_height().map(|height| (f, height)))
            .collect();
        let tallest = || first_max_by(video.iter(), |(_, height)| *height).map(|(f, _)| *f);
        match tier.height_band() {
            Some((low, high)) => first_max_by(
                video
                    .iter()
                    .filter(|(_, height)| *height >= low && high.is_none_or(|high| *height < high)),
                |(_, height)| *height,
            )
            .map(|(f, _)| *f)
            .or_else(tallest),
            None => tallest(),
        }
    };

    // Extractors list formats roughly worst to best, so the last entry is a
    // reasonable guess when no record carries the needed role.
    chosen.or_else(|| formats.last())
}

/// Like `Iterator::max_by` but keeps the first of several equal maxima.
fn first_max_by<I, T, K, F>(iter: I, mut key: F) -> Option<T>
where
    I: IntoIterator<Item = T>,
    K: PartialOrd,
    F: FnMut(&T) -> K,
{
    let mut best: Option<(T, K)> = None;
    for item in iter {
        let value = key(&item);
        let better = match &best {
            Some((_, current)) => value.partial_cmp(current) == Some(Ordering::Greater),
            None => true,
        };
        if better {
            best = Some((item, value));
        }
    }
    best.map(|(item, _)| item)
}
