use async_trait::async_trait;
use calico_proto::metadata::NowPlayingSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::core::{PlayerEvent, SessionId};
use crate::error::FetchError;
use crate::schedule::ScheduledTask;

#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self) -> Result<NowPlayingSnapshot, FetchError>;
}

/// Fetches the now-playing feed immediately and then every `period` while
/// active.  Results are tagged with the session that started the poller so
/// the core can drop anything that arrives after the session ended.
pub struct MetadataPoller {
    source: Arc<dyn MetadataSource>,
    period: Duration,
    task: Option<ScheduledTask>,
}

impl MetadataPoller {
    pub fn new(source: Arc<dyn MetadataSource>, period: Duration) -> Self {
        Self {
            source,
            period,
            task: None,
        }
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Returns false (and does nothing) if already polling.
    pub fn start(&mut self, session: SessionId, events: mpsc::Sender<PlayerEvent>) -> bool {
        if self.task.is_some() {
            return false;
        }
        let source = self.source.clone();
        let period = self.period;
        self.task = Some(ScheduledTask::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let result = source.fetch().await;
                if let Err(e) = &result {
                    debug!("metadata fetch failed: {}", e);
                }
                if events
                    .send(PlayerEvent::Metadata { session, result })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
        true
    }

    pub fn stop(&mut self) {
        self.task = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFeed;
    use calico_proto::metadata::TrackIdentity;

    fn snapshot(artist: &str, title: &str) -> NowPlayingSnapshot {
        NowPlayingSnapshot {
            artist: Some(artist.to_string()),
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_on_the_period() {
        let feed = Arc::new(ScriptedFeed::repeating(snapshot("A", "B")));
        let mut poller = MetadataPoller::new(feed.clone(), Duration::from_secs(10));
        let (tx, mut rx) = mpsc::channel(16);
        let session = SessionId(7);

        let t0 = tokio::time::Instant::now();
        assert!(poller.start(session, tx.clone()));
        assert!(!poller.start(session, tx));

        for expected in [0, 10, 20] {
            match rx.recv().await {
                Some(PlayerEvent::Metadata { session: s, result }) => {
                    assert_eq!(s, session);
                    assert_eq!(result.unwrap().identity(), TrackIdentity::new("A", "B"));
                }
                other => panic!("unexpected event {:?}", other),
            }
            assert_eq!(t0.elapsed().as_secs(), expected);
        }
        assert_eq!(feed.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_future_fetches() {
        let feed = Arc::new(ScriptedFeed::repeating(snapshot("A", "B")));
        let mut poller = MetadataPoller::new(feed.clone(), Duration::from_secs(10));
        let (tx, mut rx) = mpsc::channel(16);

        poller.start(SessionId(1), tx);
        assert!(rx.recv().await.is_some());
        poller.stop();
        assert!(!poller.is_active());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(feed.calls(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_reported_and_polling_continues() {
        let feed = Arc::new(ScriptedFeed::default());
        feed.push(Err(FetchError::Status {
            status: 503,
            body: String::new(),
        }));
        feed.push(Ok(snapshot("A", "B")));
        let mut poller = MetadataPoller::new(feed, Duration::from_secs(10));
        let (tx, mut rx) = mpsc::channel(16);
        poller.start(SessionId(1), tx);

        let Some(PlayerEvent::Metadata { result, .. }) = rx.recv().await else {
            panic!("expected metadata");
        };
        assert!(result.is_err());
        let Some(PlayerEvent::Metadata { result, .. }) = rx.recv().await else {
            panic!("expected metadata");
        };
        assert!(result.is_ok());
    }
}
