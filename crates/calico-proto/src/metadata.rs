//! Now-playing feed: the JSON document published next to the live stream and
//! the immutable snapshot the player builds from it.
//!
//! The feed is loosely typed (fields come and go, numbers sometimes arrive as
//! strings), so parsing works on a `serde_json::Value` and never fails: an
//! unusable field is treated as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of `prev_artist_N` / `prev_title_N` slots in the feed.
pub const PREVIOUS_SLOTS: usize = 5;

/// The (artist, title) pair that decides whether two snapshots are the same
/// track.  Compared exactly: case-sensitive, untrimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TrackIdentity {
    pub artist: String,
    pub title: String,
}

impl TrackIdentity {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }

    /// True when both halves are non-empty, i.e. the pair can be rated.
    pub fn is_complete(&self) -> bool {
        !self.artist.is_empty() && !self.title.is_empty()
    }
}

impl std::fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} \u{2013} {}", self.artist, self.title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tag {
    New,
    Summer,
    VideoGames,
}

impl Tag {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Summer => "Summer",
            Self::VideoGames => "Video Games",
        }
    }
}

/// One `prev_artist_N` / `prev_title_N` pair as supplied; either half may be
/// missing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreviousSlot {
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl PreviousSlot {
    /// The pair as a track, if both halves are present and non-empty.
    pub fn complete(&self) -> Option<TrackIdentity> {
        let artist = self.artist.as_deref().filter(|s| !s.is_empty())?;
        let title = self.title.as_deref().filter(|s| !s.is_empty())?;
        Some(TrackIdentity::new(artist, title))
    }
}

/// One poll of the metadata feed.  Replaces the previously displayed snapshot
/// wholesale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NowPlayingSnapshot {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub release_date: Option<String>,
    pub sample_rate_hz: Option<u32>,
    pub bit_depth: Option<u32>,
    /// Always in `New`, `Summer`, `VideoGames` order.
    pub tags: Vec<Tag>,
    /// Most recent first, exactly as the feed lists them.
    pub previous: Vec<PreviousSlot>,
}

impl NowPlayingSnapshot {
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_feed(&value))
    }

    pub fn from_feed(feed: &Value) -> Self {
        let mut tags = Vec::new();
        for (key, tag) in [
            ("is_new", Tag::New),
            ("is_summer", Tag::Summer),
            ("is_vidgames", Tag::VideoGames),
        ] {
            if feed.get(key).and_then(Value::as_bool).unwrap_or(false) {
                tags.push(tag);
            }
        }

        let previous = (1..=PREVIOUS_SLOTS)
            .map(|i| PreviousSlot {
                artist: text(feed, &format!("prev_artist_{}", i)),
                title: text(feed, &format!("prev_title_{}", i)),
            })
            .collect();

        Self {
            artist: text(feed, "artist"),
            title: text(feed, "title"),
            album: text(feed, "album"),
            release_date: text(feed, "date"),
            sample_rate_hz: positive_number(feed, "sample_rate"),
            bit_depth: positive_number(feed, "bit_depth"),
            tags,
            previous,
        }
    }

    /// Identity used for track-change detection.  Missing fields compare as
    /// empty strings.
    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity::new(
            self.artist.clone().unwrap_or_default(),
            self.title.clone().unwrap_or_default(),
        )
    }

    /// Up to five complete previous tracks, in feed order.
    pub fn recently_played(&self) -> Vec<TrackIdentity> {
        self.previous
            .iter()
            .filter_map(PreviousSlot::complete)
            .take(PREVIOUS_SLOTS)
            .collect()
    }
}

fn text(feed: &Value, key: &str) -> Option<String> {
    match feed.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn positive_number(feed: &Value, key: &str) -> Option<u32> {
    let n = match feed.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() && n >= 1.0 && n <= u32::MAX as f64 {
        Some(n.round() as u32)
    } else {
        None
    }
}

/// `44100 → "44.1 kHz"`, `48000 → "48 kHz"`.
pub fn format_sample_rate(hz: u32) -> String {
    let khz = format!("{:.1}", hz as f64 / 1000.0);
    let khz = khz.strip_suffix(".0").unwrap_or(&khz);
    format!("{} kHz", khz)
}

pub fn format_bit_depth(bits: u32) -> String {
    format!("{}-bit", bits)
}
