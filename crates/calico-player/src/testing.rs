//! In-process stand-ins for the transport and the two HTTP services.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calico_proto::metadata::{NowPlayingSnapshot, TrackIdentity};
use calico_proto::ratings::{Rating, RatingsResponse};
use tokio::sync::mpsc;

use crate::error::{FetchError, TransportError};
use crate::identity::ListenerId;
use crate::poller::MetadataSource;
use crate::rating::RatingsApi;
use crate::transport::{OutputSink, Transport, TransportEvent};

pub const STREAM_URL: &str = "http://stream.test/live.m3u8";
pub const COVER_URL: &str = "http://stream.test/cover.jpg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Load(String),
    Attach,
    Play,
    StartLoad,
    RecoverMediaError,
    Destroy,
}

/// Records every instruction.  Clones share the record.
#[derive(Clone, Default)]
pub struct FakeTransport {
    calls: Arc<Mutex<Vec<TransportCall>>>,
    fail_load: bool,
    events: Option<mpsc::Sender<TransportEvent>>,
}

impl FakeTransport {
    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn load(
        &mut self,
        source_url: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Load(source_url.to_string()));
        if self.fail_load {
            return Err(TransportError::NotFound);
        }
        self.events = Some(events);
        Ok(())
    }

    async fn attach(&mut self, _sink: &OutputSink) -> Result<(), TransportError> {
        self.record(TransportCall::Attach);
        Ok(())
    }

    async fn play(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::Play);
        Ok(())
    }

    async fn start_load(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::StartLoad);
        Ok(())
    }

    async fn recover_media_error(&mut self) -> Result<(), TransportError> {
        self.record(TransportCall::RecoverMediaError);
        Ok(())
    }

    async fn destroy(&mut self) {
        self.record(TransportCall::Destroy);
        self.events = None;
    }
}

/// Serves queued results in order.  When the queue is empty it either
/// repeats a fixed snapshot or never answers.
#[derive(Default)]
pub struct ScriptedFeed {
    queue: Mutex<VecDeque<Result<NowPlayingSnapshot, FetchError>>>,
    repeat: Option<NowPlayingSnapshot>,
    calls: AtomicUsize,
}

impl ScriptedFeed {
    pub fn repeating(snapshot: NowPlayingSnapshot) -> Self {
        Self {
            repeat: Some(snapshot),
            ..Default::default()
        }
    }

    pub fn push(&self, result: Result<NowPlayingSnapshot, FetchError>) {
        self.queue.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for ScriptedFeed {
    async fn fetch(&self) -> Result<NowPlayingSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().unwrap().pop_front();
        match (next, &self.repeat) {
            (Some(result), _) => result,
            (None, Some(snapshot)) => Ok(snapshot.clone()),
            (None, None) => std::future::pending().await,
        }
    }
}

/// Ratings service with the server's upsert semantics, kept in memory.
#[derive(Default)]
pub struct MemoryRatings {
    votes: Mutex<HashMap<(TrackIdentity, String), Rating>>,
    submits: AtomicUsize,
}

impl MemoryRatings {
    pub fn vote(&self, track: &TrackIdentity, listener: &str, rating: Rating) {
        self.votes
            .lock()
            .unwrap()
            .insert((track.clone(), listener.to_string()), rating);
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RatingsApi for MemoryRatings {
    async fn fetch(
        &self,
        track: &TrackIdentity,
        listener: &ListenerId,
    ) -> Result<RatingsResponse, FetchError> {
        let votes = self.votes.lock().unwrap();
        let mut response = RatingsResponse::default();
        for ((t, who), rating) in votes.iter() {
            if t != track {
                continue;
            }
            match rating {
                Rating::Up => response.thumbs_up += 1,
                Rating::Down => response.thumbs_down += 1,
            }
            if who == listener.as_str() {
                response.user_rating = rating.value();
            }
        }
        Ok(response)
    }

    async fn submit(
        &self,
        track: &TrackIdentity,
        listener: &ListenerId,
        rating: Rating,
    ) -> Result<(), FetchError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.vote(track, listener.as_str(), rating);
        Ok(())
    }
}
