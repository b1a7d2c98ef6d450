//! Keeps the rating panel in step with the server for whichever track is
//! the current rating subject.
//!
//! `RatingSync` is plain state.  It hands back `RatingRequest`s for the core
//! to run and is told about completions, so every decision about stale or
//! duplicate traffic is made here and is testable without a network.

use async_trait::async_trait;
use calico_proto::metadata::TrackIdentity;
use calico_proto::ratings::{Rating, RatingsResponse};
use tracing::debug;

use crate::error::FetchError;
use crate::identity::ListenerId;

#[async_trait]
pub trait RatingsApi: Send + Sync {
    async fn fetch(
        &self,
        track: &TrackIdentity,
        listener: &ListenerId,
    ) -> Result<RatingsResponse, FetchError>;

    async fn submit(
        &self,
        track: &TrackIdentity,
        listener: &ListenerId,
        rating: Rating,
    ) -> Result<(), FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatingView {
    pub thumbs_up: u64,
    pub thumbs_down: u64,
    /// Highlighted control.
    pub own: Option<Rating>,
}

impl From<RatingsResponse> for RatingView {
    fn from(r: RatingsResponse) -> Self {
        Self {
            thumbs_up: r.thumbs_up,
            thumbs_down: r.thumbs_down,
            own: r.own_rating(),
        }
    }
}

/// `seq` numbers fetches in issue order; only the newest one may land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatingRequest {
    Fetch { track: TrackIdentity, seq: u64 },
    Submit(TrackIdentity, Rating),
}

#[derive(Debug, Default)]
pub struct RatingSync {
    subject: Option<TrackIdentity>,
    in_flight: bool,
    view: RatingView,
    last_fetch: u64,
}

impl RatingSync {
    #[cfg(test)]
    pub fn subject(&self) -> Option<&TrackIdentity> {
        self.subject.as_ref()
    }

    pub fn view(&self) -> RatingView {
        self.view
    }

    /// Controls accept input only with a subject and no submission pending.
    pub fn controls_enabled(&self) -> bool {
        self.subject.is_some() && !self.in_flight
    }

    /// Follow a new track.  Counts from the previous subject are cleared and
    /// a refresh is requested for the new one.
    pub fn set_subject(&mut self, subject: Option<TrackIdentity>) -> Option<RatingRequest> {
        if self.subject == subject {
            return None;
        }
        debug!("rating subject -> {:?}", subject);
        self.subject = subject;
        self.view = RatingView::default();
        self.refresh()
    }

    pub fn refresh(&mut self) -> Option<RatingRequest> {
        let track = self.subject.clone()?;
        self.last_fetch += 1;
        Some(RatingRequest::Fetch {
            track,
            seq: self.last_fetch,
        })
    }

    /// At most one submission is outstanding; anything else is dropped.
    pub fn submit(&mut self, rating: Rating) -> Option<RatingRequest> {
        if self.in_flight {
            debug!("rating submission already in flight, ignoring {:?}", rating);
            return None;
        }
        let subject = self.subject.clone()?;
        self.in_flight = true;
        Some(RatingRequest::Submit(subject, rating))
    }

    /// Returns true if the result was applied.  Results for anything but the
    /// current subject, results overtaken by a later fetch, and failures
    /// leave the view untouched.
    pub fn on_fetched(
        &mut self,
        track: &TrackIdentity,
        seq: u64,
        result: Result<RatingsResponse, FetchError>,
    ) -> bool {
        if self.subject.as_ref() != Some(track) {
            debug!("discarding ratings for {}, no longer current", track);
            return false;
        }
        if seq != self.last_fetch {
            debug!(
                "discarding ratings fetch #{} for {}, #{} is newer",
                seq, track, self.last_fetch
            );
            return false;
        }
        match result {
            Ok(response) => {
                self.view = response.into();
                true
            }
            Err(e) => {
                debug!("ratings fetch for {} failed: {}", track, e);
                false
            }
        }
    }

    /// Re-enable the controls and re-read the current subject, whether or
    /// not the submission succeeded.
    pub fn on_submitted(&mut self) -> Option<RatingRequest> {
        self.in_flight = false;
        self.refresh()
    }
}
