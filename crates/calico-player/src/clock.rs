//! Elapsed-time counter for the current track.
//!
//! Ticks arrive as `PlayerEvent::ClockTick` on the core's own channel so the
//! counter is only ever mutated by the core.  Every halt or reset bumps the
//! generation; ticks from an older generation are ignored.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::core::PlayerEvent;
use crate::schedule::ScheduledTask;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct ElapsedClock {
    seconds: u64,
    generation: u64,
    ticker: Option<ScheduledTask>,
}

impl ElapsedClock {
    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Start ticking from the current value.  No-op when already running.
    pub fn start(&mut self, events: &mpsc::Sender<PlayerEvent>) {
        if self.ticker.is_some() {
            return;
        }
        let generation = self.generation;
        let events = events.clone();
        self.ticker = Some(ScheduledTask::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if events
                    .send(PlayerEvent::ClockTick { generation })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    /// Stop ticking, keep the value.
    pub fn halt(&mut self) {
        if self.ticker.take().is_some() {
            self.generation += 1;
        }
    }

    /// Stop ticking and return to zero.
    pub fn reset(&mut self) {
        self.ticker = None;
        self.generation += 1;
        self.seconds = 0;
    }

    /// Zero the counter.  Keeps ticking if it was running.
    pub fn restart(&mut self, events: &mpsc::Sender<PlayerEvent>) {
        let running = self.is_running();
        self.reset();
        if running {
            self.start(events);
        }
    }

    /// Apply one tick.  Returns false for a stale tick.
    pub fn on_tick(&mut self, generation: u64) -> bool {
        if self.ticker.is_none() || generation != self.generation {
            return false;
        }
        self.seconds += 1;
        true
    }
}

/// `H:MM:SS`
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_elapsed(0), "0:00:00");
        assert_eq!(format_elapsed(61), "0:01:01");
        assert_eq!(format_elapsed(3600 + 59 * 60 + 5), "1:59:05");
        assert_eq!(format_elapsed(36_000), "10:00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second_while_running() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut clock = ElapsedClock::default();
        clock.start(&tx);

        for _ in 0..3 {
            match rx.recv().await {
                Some(PlayerEvent::ClockTick { generation }) => assert!(clock.on_tick(generation)),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(clock.seconds(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let (tx, _rx) = mpsc::channel(16);
        let mut clock = ElapsedClock::default();
        clock.start(&tx);
        let generation = clock.generation();
        clock.start(&tx);
        assert_eq!(clock.generation(), generation);
        assert!(clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_from_before_a_reset_are_ignored() {
        let (tx, _rx) = mpsc::channel(16);
        let mut clock = ElapsedClock::default();
        clock.start(&tx);
        let old = clock.generation();
        assert!(clock.on_tick(old));

        clock.restart(&tx);
        assert_eq!(clock.seconds(), 0);
        assert!(!clock.on_tick(old));
        assert!(clock.on_tick(clock.generation()));
        assert_eq!(clock.seconds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn halted_clock_keeps_its_value() {
        let (tx, _rx) = mpsc::channel(16);
        let mut clock = ElapsedClock::default();
        clock.start(&tx);
        clock.on_tick(clock.generation());
        clock.on_tick(clock.generation());
        clock.halt();
        assert!(!clock.is_running());
        assert!(!clock.on_tick(clock.generation()));
        assert_eq!(clock.seconds(), 2);
    }
}
