//! Playback state machine.
//!
//! `step` is a pure function of (status, input): it names the next status,
//! what happens to the session's lifetime, and the transport instructions to
//! run, in order.  `core` executes the result; nothing here touches I/O.

/// Classification of an unrecoverable transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalKind {
    Network,
    Media,
    Other,
}

impl std::fmt::Display for FatalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Media => "media",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// In-place recovery the session is currently attempting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Re-fetch the source (network errors).
    Reload,
    /// Re-create the decode pipeline (media errors).
    MediaReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Connecting,
    Live,
    Degraded(Recovery),
    /// Session destroyed after an unrecoverable error.  Startable again.
    Failed,
}

/// Coarse colour class for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Idle,
    Live,
    Error,
}

impl PlaybackStatus {
    /// A session (transport, poller, clock) exists only in these states.
    pub fn has_session(&self) -> bool {
        matches!(self, Self::Connecting | Self::Live | Self::Degraded(_))
    }

    /// What the play/stop toggle does from here.
    pub fn toggle_input(&self) -> SessionInput {
        match self {
            Self::Stopped | Self::Failed => SessionInput::Start,
            _ => SessionInput::Stop,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Connecting => "Connecting...",
            Self::Live => "Live",
            Self::Degraded(Recovery::Reload) => "Network error - retrying...",
            Self::Degraded(Recovery::MediaReset) => "Media error - recovering...",
            Self::Failed => "Stream unavailable",
        }
    }

    pub fn indicator(&self) -> Indicator {
        match self {
            Self::Stopped | Self::Connecting => Indicator::Idle,
            Self::Live => Indicator::Live,
            Self::Degraded(_) | Self::Failed => Indicator::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    Start,
    Stop,
    ManifestReady,
    Fatal(FatalKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    Load,
    Attach,
    Play,
    StartLoad,
    RecoverMediaError,
    Destroy,
}

/// Effect of a transition on the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Create a new session: fresh id, clock at zero, poller started.
    Begin,
    Keep,
    /// Tear the session down: poller and clock halted, current track cleared.
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub next: PlaybackStatus,
    pub lifecycle: Lifecycle,
    pub actions: &'static [TransportAction],
}

/// Recovery table.  `None` means the error cannot be handled in place and
/// the session is torn down.
pub fn recovery_for(kind: FatalKind) -> Option<Recovery> {
    match kind {
        FatalKind::Network => Some(Recovery::Reload),
        FatalKind::Media => Some(Recovery::MediaReset),
        FatalKind::Other => None,
    }
}

fn recovery_action(recovery: Recovery) -> &'static [TransportAction] {
    match recovery {
        Recovery::Reload => &[TransportAction::StartLoad],
        Recovery::MediaReset => &[TransportAction::RecoverMediaError],
    }
}

fn to(
    next: PlaybackStatus,
    lifecycle: Lifecycle,
    actions: &'static [TransportAction],
) -> Option<Step> {
    Some(Step {
        next,
        lifecycle,
        actions,
    })
}

/// `None` when `input` has no effect in `status`.
pub fn step(status: PlaybackStatus, input: SessionInput) -> Option<Step> {
    use PlaybackStatus::*;

    match (status, input) {
        (Stopped | Failed, SessionInput::Start) => to(
            Connecting,
            Lifecycle::Begin,
            &[TransportAction::Load, TransportAction::Attach],
        ),
        (Stopped, _) => None,
        (Failed, SessionInput::Stop) => to(Stopped, Lifecycle::Keep, &[]),
        (Failed, _) => None,

        (_, SessionInput::Start) => None,
        (_, SessionInput::Stop) => to(Stopped, Lifecycle::End, &[TransportAction::Destroy]),

        (Connecting | Degraded(_), SessionInput::ManifestReady) => {
            to(Live, Lifecycle::Keep, &[TransportAction::Play])
        }
        (Live, SessionInput::ManifestReady) => None,

        (_, SessionInput::Fatal(kind)) => match recovery_for(kind) {
            Some(recovery) => to(Degraded(recovery), Lifecycle::Keep, recovery_action(recovery)),
            None => to(Failed, Lifecycle::End, &[TransportAction::Destroy]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlaybackStatus::*;

    const ACTIVE: [PlaybackStatus; 4] = [
        Connecting,
        Live,
        Degraded(Recovery::Reload),
        Degraded(Recovery::MediaReset),
    ];

    #[test]
    fn start_from_idle_begins_a_session() {
        for from in [Stopped, Failed] {
            let s = step(from, SessionInput::Start).unwrap();
            assert_eq!(s.next, Connecting);
            assert_eq!(s.lifecycle, Lifecycle::Begin);
            assert_eq!(s.actions, &[TransportAction::Load, TransportAction::Attach]);
        }
    }

    #[test]
    fn start_while_active_is_ignored() {
        for from in ACTIVE {
            assert_eq!(step(from, SessionInput::Start), None, "{:?}", from);
        }
    }

    #[test]
    fn stop_from_any_active_state_destroys() {
        for from in ACTIVE {
            let s = step(from, SessionInput::Stop).unwrap();
            assert_eq!(s.next, Stopped);
            assert_eq!(s.lifecycle, Lifecycle::End);
            assert_eq!(s.actions, &[TransportAction::Destroy]);
        }
        assert_eq!(step(Stopped, SessionInput::Stop), None);
    }

    #[test]
    fn manifest_ready_goes_live_and_plays() {
        for from in [Connecting, Degraded(Recovery::Reload), Degraded(Recovery::MediaReset)] {
            let s = step(from, SessionInput::ManifestReady).unwrap();
            assert_eq!(s.next, Live);
            assert_eq!(s.lifecycle, Lifecycle::Keep);
            assert_eq!(s.actions, &[TransportAction::Play]);
        }
        assert_eq!(step(Live, SessionInput::ManifestReady), None);
        assert_eq!(step(Stopped, SessionInput::ManifestReady), None);
    }

    #[test]
    fn recoverable_errors_keep_the_session() {
        for from in ACTIVE {
            let s = step(from, SessionInput::Fatal(FatalKind::Network)).unwrap();
            assert_eq!(s.next, Degraded(Recovery::Reload));
            assert_eq!(s.lifecycle, Lifecycle::Keep);
            assert_eq!(s.actions, &[TransportAction::StartLoad]);

            let s = step(from, SessionInput::Fatal(FatalKind::Media)).unwrap();
            assert_eq!(s.next, Degraded(Recovery::MediaReset));
            assert_eq!(s.actions, &[TransportAction::RecoverMediaError]);
        }
    }

    #[test]
    fn other_errors_tear_down() {
        for from in ACTIVE {
            let s = step(from, SessionInput::Fatal(FatalKind::Other)).unwrap();
            assert_eq!(s.next, Failed);
            assert_eq!(s.lifecycle, Lifecycle::End);
            assert_eq!(s.actions, &[TransportAction::Destroy]);
        }
    }

    #[test]
    fn errors_without_a_session_are_ignored() {
        for kind in [FatalKind::Network, FatalKind::Media, FatalKind::Other] {
            assert_eq!(step(Stopped, SessionInput::Fatal(kind)), None);
            assert_eq!(step(Failed, SessionInput::Fatal(kind)), None);
        }
    }

    #[test]
    fn toggle_follows_session_presence() {
        assert_eq!(Stopped.toggle_input(), SessionInput::Start);
        assert_eq!(Failed.toggle_input(), SessionInput::Start);
        for from in ACTIVE {
            assert_eq!(from.toggle_input(), SessionInput::Stop);
            assert!(from.has_session());
        }
        assert!(!Failed.has_session());
    }

    #[test]
    fn labels() {
        assert_eq!(Connecting.label(), "Connecting...");
        assert_eq!(Degraded(Recovery::Reload).label(), "Network error - retrying...");
        assert_eq!(Degraded(Recovery::MediaReset).label(), "Media error - recovering...");
        assert_eq!(Failed.label(), "Stream unavailable");
        assert_eq!(Live.indicator(), Indicator::Live);
        assert_eq!(Failed.indicator(), Indicator::Error);
    }
}
