use std::io;

use calico_proto::ratings::Rating;
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::debug;

use crate::core::{Command, PlayerEvent};
use crate::ui;
use crate::view::PlayerView;

enum AppMessage {
    Event(Event),
    Log(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Send(Command),
    Quit,
}

/// Map a key press to an action.  Vote keys are dropped while the rating
/// controls are disabled.
pub fn key_action(key: KeyEvent, rating_enabled: bool) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let vote = |rating| rating_enabled.then_some(Action::Send(Command::Rate(rating)));
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char(' ') => Some(Action::Send(Command::Toggle)),
        KeyCode::Char('+') | KeyCode::Char('u') => vote(Rating::Up),
        KeyCode::Char('-') | KeyCode::Char('d') => vote(Rating::Down),
        _ => None,
    }
}

pub struct App {
    view_rx: watch::Receiver<PlayerView>,
    core_tx: mpsc::Sender<PlayerEvent>,
    last_log: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(view_rx: watch::Receiver<PlayerView>, core_tx: mpsc::Sender<PlayerEvent>) -> Self {
        Self {
            view_rx,
            core_tx,
            last_log: None,
            should_quit: false,
        }
    }

    pub async fn run(mut self, mut log_rx: broadcast::Receiver<String>) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        debug!("run(): terminal ready, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);

        // ── keyboard ──────────────────────────────────────────────────────────
        let key_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if key_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── warnings and errors for the footer ────────────────────────────────
        tokio::spawn(async move {
            loop {
                match log_rx.recv().await {
                    Ok(line) => {
                        if tx.send(AppMessage::Log(line)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let result = self.event_loop(&mut terminal, &mut rx).await;

        // ── teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        rx: &mut mpsc::Receiver<AppMessage>,
    ) -> anyhow::Result<()> {
        loop {
            {
                let view = self.view_rx.borrow_and_update();
                terminal.draw(|f| ui::draw(f, &view, self.last_log.as_deref()))?;
            }

            if self.should_quit {
                return Ok(());
            }

            tokio::select! {
                Some(msg) = rx.recv() => self.handle_message(msg).await,
                changed = self.view_rx.changed() => {
                    if changed.is_err() {
                        // Core is gone; nothing left to show.
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                let rating_enabled = self.view_rx.borrow().rating_enabled;
                match key_action(key, rating_enabled) {
                    Some(Action::Quit) => self.should_quit = true,
                    Some(Action::Send(cmd)) => {
                        if self.core_tx.send(PlayerEvent::Command(cmd)).await.is_err() {
                            self.should_quit = true;
                        }
                    }
                    None => {}
                }
            }
            // Resize and the rest only need the redraw the loop already does.
            AppMessage::Event(_) => {}
            AppMessage::Log(line) => self.last_log = Some(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn key_bindings() {
        assert_eq!(
            key_action(press(KeyCode::Char(' ')), false),
            Some(Action::Send(Command::Toggle))
        );
        assert_eq!(
            key_action(press(KeyCode::Char('+')), true),
            Some(Action::Send(Command::Rate(Rating::Up)))
        );
        assert_eq!(
            key_action(press(KeyCode::Char('d')), true),
            Some(Action::Send(Command::Rate(Rating::Down)))
        );
        assert_eq!(key_action(press(KeyCode::Char('q')), false), Some(Action::Quit));
        assert_eq!(key_action(press(KeyCode::Esc), false), Some(Action::Quit));
        assert_eq!(
            key_action(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), false),
            Some(Action::Quit)
        );
        assert_eq!(key_action(press(KeyCode::Char('x')), true), None);
    }

    #[test]
    fn votes_are_ignored_while_disabled() {
        assert_eq!(key_action(press(KeyCode::Char('+')), false), None);
        assert_eq!(key_action(press(KeyCode::Char('-')), false), None);
    }
}
