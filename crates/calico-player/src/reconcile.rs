//! Turns a metadata snapshot into display state and decides whether the
//! track changed.

use calico_proto::metadata::{
    format_bit_depth, format_sample_rate, NowPlayingSnapshot, Tag, TrackIdentity,
};

const MISSING: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub artist: String,
    pub title: String,
    pub album_line: String,
    pub tags: Vec<Tag>,
    pub source_quality: String,
    pub stream_quality: String,
    pub cover_url: String,
    /// Empty means "no previous tracks yet".
    pub recently_played: Vec<TrackIdentity>,
}

impl NowPlaying {
    /// Placeholder shown before the first snapshot arrives.
    pub fn new(cover_url: &str) -> Self {
        let (source_quality, stream_quality) = quality_lines(None, None);
        Self {
            artist: String::new(),
            title: String::new(),
            album_line: String::new(),
            tags: Vec::new(),
            source_quality,
            stream_quality,
            cover_url: cover_url.to_string(),
            recently_played: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub identity: TrackIdentity,
    /// The identity differs from the previous snapshot of this session.
    pub track_changed: bool,
    pub first_of_session: bool,
}

impl Reconciliation {
    /// The track ratings should follow, if it can be rated at all.
    pub fn rating_subject(&self) -> Option<TrackIdentity> {
        self.identity
            .is_complete()
            .then(|| self.identity.clone())
    }
}

/// Replace the displayed fields with `snapshot` and record its identity in
/// `last_track`.  The cover URL is left alone; the caller refreshes it when
/// `track_changed` is set.
pub fn apply(
    display: &mut NowPlaying,
    last_track: &mut Option<TrackIdentity>,
    snapshot: &NowPlayingSnapshot,
) -> Reconciliation {
    display.artist = non_empty_or(&snapshot.artist, "Unknown Artist");
    display.title = non_empty_or(&snapshot.title, "Unknown Track");
    display.album_line = album_line(snapshot);
    display.tags = snapshot.tags.clone();
    let (source, stream) = quality_lines(snapshot.bit_depth, snapshot.sample_rate_hz);
    display.source_quality = source;
    display.stream_quality = stream;
    display.recently_played = snapshot.recently_played();

    let identity = snapshot.identity();
    let first_of_session = last_track.is_none();
    let track_changed = last_track.as_ref().is_some_and(|last| *last != identity);
    *last_track = Some(identity.clone());

    Reconciliation {
        identity,
        track_changed,
        first_of_session,
    }
}

/// Cache-busted cover art URL.
pub fn cover_art_url(base: &str, unix_millis: i64) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", base, separator, unix_millis)
}

fn non_empty_or(value: &Option<String>, fallback: &str) -> String {
    match value.as_deref() {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => fallback.to_string(),
    }
}

fn album_line(snapshot: &NowPlayingSnapshot) -> String {
    let mut parts = Vec::new();
    if let Some(album) = snapshot.album.as_deref().filter(|s| !s.is_empty()) {
        parts.push(album.to_string());
    }
    if let Some(date) = snapshot.release_date.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("({})", date));
    }
    parts.join(" ")
}

fn quality_lines(bit_depth: Option<u32>, sample_rate_hz: Option<u32>) -> (String, String) {
    let bd = bit_depth.map_or_else(|| MISSING.to_string(), format_bit_depth);
    let sr = sample_rate_hz.map_or_else(|| MISSING.to_string(), format_sample_rate);
    (
        format!("Source quality: {} / {}", bd, sr),
        format!("Stream quality: {} / {} / FLAC / HLS Lossless", bd, sr),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use calico_proto::metadata::PreviousSlot;

    fn snapshot(artist: &str, title: &str) -> NowPlayingSnapshot {
        NowPlayingSnapshot {
            artist: Some(artist.to_string()),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn first_snapshot_is_not_a_track_change() {
        let mut display = NowPlaying::new("http://cover");
        let mut last = None;
        let r = apply(&mut display, &mut last, &snapshot("A", "B"));
        assert!(r.first_of_session);
        assert!(!r.track_changed);
        assert_eq!(last, Some(TrackIdentity::new("A", "B")));
        assert_eq!(display.artist, "A");
        assert_eq!(display.title, "B");
    }

    #[test]
    fn identical_identity_is_not_a_change() {
        let mut display = NowPlaying::new("http://cover");
        let mut last = None;
        apply(&mut display, &mut last, &snapshot("A", "B"));
        let mut same = snapshot("A", "B");
        same.album = Some("Different album".to_string());
        let r = apply(&mut display, &mut last, &same);
        assert!(!r.track_changed);
        assert!(!r.first_of_session);
        assert_eq!(display.album_line, "Different album");
    }

    #[test]
    fn identity_comparison_is_exact() {
        let mut display = NowPlaying::new("http://cover");
        let mut last = None;
        apply(&mut display, &mut last, &snapshot("A", "B"));
        assert!(apply(&mut display, &mut last, &snapshot("a", "B")).track_changed);
        assert!(apply(&mut display, &mut last, &snapshot("a", "B ")).track_changed);
    }

    #[test]
    fn missing_fields_get_placeholders() {
        let mut display = NowPlaying::new("http://cover");
        let mut last = None;
        let r = apply(&mut display, &mut last, &NowPlayingSnapshot::default());
        assert_eq!(display.artist, "Unknown Artist");
        assert_eq!(display.title, "Unknown Track");
        assert_eq!(display.album_line, "");
        assert_eq!(display.source_quality, "Source quality: -- / --");
        assert_eq!(display.stream_quality, "Stream quality: -- / -- / FLAC / HLS Lossless");
        assert!(display.recently_played.is_empty());
        assert_eq!(r.identity, TrackIdentity::new("", ""));
        assert_eq!(r.rating_subject(), None);
    }

    #[test]
    fn album_and_quality_lines() {
        let mut display = NowPlaying::new("http://cover");
        let mut last = None;
        let mut s = snapshot("A", "B");
        s.album = Some("LP".to_string());
        s.release_date = Some("1999".to_string());
        s.bit_depth = Some(24);
        s.sample_rate_hz = Some(44100);
        s.tags = vec![Tag::New, Tag::VideoGames];
        apply(&mut display, &mut last, &s);
        assert_eq!(display.album_line, "LP (1999)");
        assert_eq!(display.source_quality, "Source quality: 24-bit / 44.1 kHz");
        assert_eq!(
            display.stream_quality,
            "Stream quality: 24-bit / 44.1 kHz / FLAC / HLS Lossless"
        );
        assert_eq!(display.tags, vec![Tag::New, Tag::VideoGames]);

        s.album = None;
        apply(&mut display, &mut last, &s);
        assert_eq!(display.album_line, "(1999)");
    }

    #[test]
    fn recently_played_skips_incomplete_slots() {
        let mut display = NowPlaying::new("http://cover");
        let mut last = None;
        let mut s = snapshot("A", "B");
        s.previous = vec![
            PreviousSlot {
                artist: Some("P1".to_string()),
                title: Some("T1".to_string()),
            },
            PreviousSlot {
                artist: Some("P2".to_string()),
                title: None,
            },
            PreviousSlot {
                artist: Some("P3".to_string()),
                title: Some("T3".to_string()),
            },
        ];
        apply(&mut display, &mut last, &s);
        assert_eq!(
            display.recently_played,
            vec![TrackIdentity::new("P1", "T1"), TrackIdentity::new("P3", "T3")]
        );
    }

    #[test]
    fn partial_identity_has_no_rating_subject() {
        let mut display = NowPlaying::new("http://cover");
        let mut last = None;
        let mut s = snapshot("A", "B");
        s.title = None;
        let r = apply(&mut display, &mut last, &s);
        assert_eq!(r.rating_subject(), None);

        let r = apply(&mut display, &mut last, &snapshot("A", "B"));
        assert_eq!(r.rating_subject(), Some(TrackIdentity::new("A", "B")));
    }

    #[test]
    fn cover_url_gets_a_timestamp() {
        assert_eq!(
            cover_art_url("https://cdn/cover.jpg", 1700000000000),
            "https://cdn/cover.jpg?t=1700000000000"
        );
        assert_eq!(cover_art_url("https://cdn/cover?size=l", 5), "https://cdn/cover?size=l&t=5");
    }
}
