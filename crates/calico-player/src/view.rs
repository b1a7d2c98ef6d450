use crate::clock::format_elapsed;
use crate::reconcile::NowPlaying;
use crate::rating::RatingView;
use crate::session::PlaybackStatus;

/// Everything the front-end draws, published by the core after every event
/// that changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub status: PlaybackStatus,
    pub elapsed_secs: u64,
    pub now_playing: NowPlaying,
    pub rating: RatingView,
    pub rating_enabled: bool,
}

impl PlayerView {
    pub fn new(cover_url: &str) -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            elapsed_secs: 0,
            now_playing: NowPlaying::new(cover_url),
            rating: RatingView::default(),
            rating_enabled: false,
        }
    }

    pub fn elapsed(&self) -> String {
        format_elapsed(self.elapsed_secs)
    }
}
