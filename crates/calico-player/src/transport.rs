//! The seam between the player and the streaming library that actually
//! fetches and decodes the live stream.
//!
//! The player only ever issues the handful of instructions below and only
//! ever reacts to two kinds of events: the stream became playable, or the
//! library hit an error it cannot absorb on its own.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::session::FatalKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The live playlist was parsed and audio can start.
    ManifestReady,
    /// An error the transport could not recover from by itself.
    Fatal { kind: FatalKind, detail: String },
}

/// Where decoded audio goes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSink {
    /// 0.0..=1.0
    pub volume: f32,
    pub device: Option<String>,
}

#[async_trait]
pub trait Transport: Send {
    /// Acquire the transport and start fetching `source_url`.  Lifecycle and
    /// fatal-error events for this load are delivered on `events` until
    /// `destroy` is called.
    async fn load(
        &mut self,
        source_url: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError>;

    async fn attach(&mut self, sink: &OutputSink) -> Result<(), TransportError>;

    /// Begin audio output of the loaded stream.
    async fn play(&mut self) -> Result<(), TransportError>;

    /// Re-attempt fetching the current source after a network error.
    async fn start_load(&mut self) -> Result<(), TransportError>;

    /// Re-establish the decode pipeline after a media error.
    async fn recover_media_error(&mut self) -> Result<(), TransportError>;

    /// Release every resource.  Safe to call when nothing is loaded.
    async fn destroy(&mut self);
}
