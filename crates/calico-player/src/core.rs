/// PlayerCore: single-owner event loop for all mutable player state.
///
/// The front-end, the transport, the metadata poller, the elapsed clock and
/// the ratings requests all talk to the core by sending `PlayerEvent`s on one
/// channel.  The core owns the transport and every piece of session state;
/// no other task touches them, so there are no locks and results always
/// apply in the order the core receives them.
///
/// After each event the derived `PlayerView` is published on a watch
/// channel if it changed.
use std::sync::Arc;
use std::time::Duration;

use calico_proto::config::PlayerConfig;
use calico_proto::metadata::{NowPlayingSnapshot, TrackIdentity};
use calico_proto::ratings::{Rating, RatingsResponse};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::clock::ElapsedClock;
use crate::error::{FetchError, TransportError};
use crate::identity::ListenerId;
use crate::poller::{MetadataPoller, MetadataSource};
use crate::rating::{RatingRequest, RatingSync, RatingsApi};
use crate::reconcile::{self, cover_art_url, NowPlaying};
use crate::session::{
    self, FatalKind, Lifecycle, PlaybackStatus, SessionInput, Step, TransportAction,
};
use crate::transport::{OutputSink, Transport, TransportEvent};
use crate::view::PlayerView;

/// Identifies one start..stop lifetime.  Results produced for an older
/// session are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(pub u64);

/// User intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Rate(Rating),
}

/// All inputs into the PlayerCore loop.
#[derive(Debug)]
pub enum PlayerEvent {
    Command(Command),
    Transport {
        session: SessionId,
        event: TransportEvent,
    },
    Metadata {
        session: SessionId,
        result: Result<NowPlayingSnapshot, FetchError>,
    },
    ClockTick {
        generation: u64,
    },
    RatingsFetched {
        track: TrackIdentity,
        seq: u64,
        result: Result<RatingsResponse, FetchError>,
    },
    RatingSubmitted {
        track: TrackIdentity,
        result: Result<(), FetchError>,
    },
    Shutdown,
}

struct Session {
    id: SessionId,
    /// Identity of the last snapshot applied in this session.
    current_track: Option<TrackIdentity>,
}

pub struct PlayerCore {
    config: PlayerConfig,
    listener: ListenerId,
    transport: Box<dyn Transport>,
    ratings_api: Arc<dyn RatingsApi>,
    /// Our own inbox, cloned into every task that reports back.
    events: mpsc::Sender<PlayerEvent>,
    view_tx: watch::Sender<PlayerView>,
    status: PlaybackStatus,
    session: Option<Session>,
    last_session: u64,
    poller: MetadataPoller,
    clock: ElapsedClock,
    now_playing: NowPlaying,
    rating: RatingSync,
}

impl PlayerCore {
    pub fn new(
        config: PlayerConfig,
        listener: ListenerId,
        transport: Box<dyn Transport>,
        metadata: Arc<dyn MetadataSource>,
        ratings_api: Arc<dyn RatingsApi>,
        events: mpsc::Sender<PlayerEvent>,
    ) -> (Self, watch::Receiver<PlayerView>) {
        let (view_tx, view_rx) = watch::channel(PlayerView::new(&config.cover_url));
        let period = Duration::from_secs(config.poll_interval_secs.max(1));
        let core = Self {
            poller: MetadataPoller::new(metadata, period),
            now_playing: NowPlaying::new(&config.cover_url),
            config,
            listener,
            transport,
            ratings_api,
            events,
            view_tx,
            status: PlaybackStatus::Stopped,
            session: None,
            last_session: 0,
            clock: ElapsedClock::default(),
            rating: RatingSync::default(),
        };
        (core, view_rx)
    }

    /// Run until a `Shutdown` event arrives.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<PlayerEvent>) {
        info!("PlayerCore: starting event loop");
        while let Some(evt) = event_rx.recv().await {
            if let PlayerEvent::Shutdown = evt {
                info!("PlayerCore: shutdown requested");
                break;
            }
            self.handle(evt).await;
        }
        if self.status.has_session() {
            self.apply(SessionInput::Stop).await;
        }
    }

    async fn handle(&mut self, evt: PlayerEvent) {
        match evt {
            PlayerEvent::Command(Command::Toggle) => {
                let input = self.status.toggle_input();
                info!("PlayerCore: toggle -> {:?}", input);
                self.apply(input).await;
            }

            PlayerEvent::Command(Command::Rate(rating)) => {
                if let Some(request) = self.rating.submit(rating) {
                    self.dispatch(request);
                }
            }

            PlayerEvent::Transport { session, event } => {
                if !self.is_current(session) {
                    debug!("discarding transport event from ended session: {:?}", event);
                } else {
                    match event {
                        TransportEvent::ManifestReady => {
                            info!("Stream ready");
                            self.apply(SessionInput::ManifestReady).await;
                        }
                        TransportEvent::Fatal { kind, detail } => {
                            warn!("Stream {} error: {}", kind, detail);
                            self.apply(SessionInput::Fatal(kind)).await;
                        }
                    }
                }
            }

            PlayerEvent::Metadata { session, result } => {
                if !self.is_current(session) {
                    debug!("discarding metadata from ended session");
                } else {
                    match result {
                        Ok(snapshot) => self.reconcile(&snapshot),
                        Err(e) => debug!("metadata unavailable, keeping display: {}", e),
                    }
                }
            }

            PlayerEvent::ClockTick { generation } => {
                self.clock.on_tick(generation);
            }

            PlayerEvent::RatingsFetched { track, seq, result } => {
                self.rating.on_fetched(&track, seq, result);
            }

            PlayerEvent::RatingSubmitted { track, result } => {
                match result {
                    Ok(()) => info!("Rated {}", track),
                    Err(e) => warn!("Rating {} failed: {}", track, e),
                }
                if let Some(request) = self.rating.on_submitted() {
                    self.dispatch(request);
                }
            }

            PlayerEvent::Shutdown => {}
        }
        self.publish();
    }

    fn is_current(&self, session: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session)
    }

    /// Feed `input` to the state machine and carry out the resulting step.
    /// A transport instruction that fails counts as an unrecoverable error.
    async fn apply(&mut self, input: SessionInput) {
        let Some(step) = session::step(self.status, input) else {
            debug!("{:?} ignored while {:?}", input, self.status);
            return;
        };
        self.enter(&step);
        if let Err(e) = self.perform(step.actions).await {
            warn!("Transport failed: {}", e);
            if let Some(fail) = session::step(self.status, SessionInput::Fatal(FatalKind::Other)) {
                self.enter(&fail);
                if let Err(e) = self.perform(fail.actions).await {
                    warn!("Transport teardown failed: {}", e);
                }
            }
        }
    }

    fn enter(&mut self, step: &Step) {
        info!("Playback: {:?} -> {:?}", self.status, step.next);
        self.status = step.next;

        match step.lifecycle {
            Lifecycle::Begin => {
                self.last_session += 1;
                let id = SessionId(self.last_session);
                self.session = Some(Session {
                    id,
                    current_track: None,
                });
                self.clock.reset();
                self.poller.start(id, self.events.clone());
            }
            Lifecycle::Keep => {}
            Lifecycle::End => {
                self.session = None;
                self.poller.stop();
                if self.status == PlaybackStatus::Failed {
                    self.clock.halt();
                } else {
                    self.clock.reset();
                }
            }
        }

        if self.status == PlaybackStatus::Live {
            self.clock.start(&self.events);
        }
    }

    async fn perform(&mut self, actions: &[TransportAction]) -> Result<(), TransportError> {
        for action in actions {
            debug!("transport: {:?}", action);
            match action {
                TransportAction::Load => {
                    let session = self
                        .session
                        .as_ref()
                        .map(|s| s.id)
                        .ok_or(TransportError::NotLoaded)?;
                    let (tx, mut rx) = mpsc::channel(16);
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        while let Some(event) = rx.recv().await {
                            if events
                                .send(PlayerEvent::Transport { session, event })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                    });
                    self.transport.load(&self.config.stream_url, tx).await?;
                }
                TransportAction::Attach => {
                    let sink = OutputSink {
                        volume: self.config.volume,
                        device: self.config.audio_device.clone(),
                    };
                    self.transport.attach(&sink).await?;
                }
                TransportAction::Play => self.transport.play().await?,
                TransportAction::StartLoad => self.transport.start_load().await?,
                TransportAction::RecoverMediaError => self.transport.recover_media_error().await?,
                TransportAction::Destroy => self.transport.destroy().await,
            }
        }
        Ok(())
    }

    fn reconcile(&mut self, snapshot: &NowPlayingSnapshot) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let outcome = reconcile::apply(&mut self.now_playing, &mut session.current_track, snapshot);

        if outcome.first_of_session {
            info!("Now playing: {}", outcome.identity);
        }
        if outcome.track_changed {
            info!("Track changed: {}", outcome.identity);
            self.clock.restart(&self.events);
            self.now_playing.cover_url = cover_art_url(
                &self.config.cover_url,
                chrono::Utc::now().timestamp_millis(),
            );
        }
        // A new session re-reads the counts even when the track is unchanged.
        let request = match self.rating.set_subject(outcome.rating_subject()) {
            None if outcome.first_of_session => self.rating.refresh(),
            request => request,
        };
        if let Some(request) = request {
            self.dispatch(request);
        }
    }

    /// Run a ratings request off-loop; its result comes back as an event.
    fn dispatch(&self, request: RatingRequest) {
        let api = self.ratings_api.clone();
        let listener = self.listener.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let evt = match request {
                RatingRequest::Fetch { track, seq } => {
                    let result = api.fetch(&track, &listener).await;
                    PlayerEvent::RatingsFetched { track, seq, result }
                }
                RatingRequest::Submit(track, rating) => {
                    let result = api.submit(&track, &listener, rating).await;
                    PlayerEvent::RatingSubmitted { track, result }
                }
            };
            let _ = events.send(evt).await;
        });
    }

    fn publish(&self) {
        let view = PlayerView {
            status: self.status,
            elapsed_secs: self.clock.seconds(),
            now_playing: self.now_playing.clone(),
            rating: self.rating.view(),
            rating_enabled: self.rating.controls_enabled(),
        };
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}
