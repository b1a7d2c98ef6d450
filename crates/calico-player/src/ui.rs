use calico_proto::metadata::TrackIdentity;
use calico_proto::ratings::Rating;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::theme::*;
use crate::view::PlayerView;

const KEY_HINTS: &str = "space play/stop  + up  - down  q quit";

pub fn draw(frame: &mut Frame, view: &PlayerView, footer: Option<&str>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status
            Constraint::Length(9), // now playing
            Constraint::Length(3), // ratings
            Constraint::Min(4),    // recently played
            Constraint::Length(1), // footer
        ])
        .split(frame.area());

    draw_status(frame, chunks[0], view);
    draw_now_playing(frame, chunks[1], view);
    draw_ratings(frame, chunks[2], view);
    draw_recent(frame, chunks[3], &view.now_playing.recently_played);
    draw_footer(frame, chunks[4], footer);
}

fn draw_status(frame: &mut Frame, area: Rect, view: &PlayerView) {
    let line = Line::from(vec![
        Span::styled(" calico ", style_title().fg(C_ACCENT)),
        Span::styled("● ", style_status(view.status.indicator())),
        Span::styled(view.status.label(), style_status(view.status.indicator())),
        Span::styled("  ", style_default()),
        Span::styled(view.elapsed(), style_secondary()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_now_playing(frame: &mut Frame, area: Rect, view: &PlayerView) {
    let np = &view.now_playing;
    let mut lines = Vec::new();
    if np.artist.is_empty() && np.title.is_empty() {
        lines.push(Line::styled("Waiting for track info", style_muted()));
    } else {
        lines.push(Line::styled(np.artist.as_str(), style_title()));
        lines.push(Line::styled(np.title.as_str(), style_default()));
    }
    lines.push(Line::styled(np.album_line.as_str(), style_secondary()));

    let tags: Vec<Span> = np
        .tags
        .iter()
        .flat_map(|t| [Span::styled(format!("[{}]", t.label()), style_tag()), Span::raw(" ")])
        .collect();
    lines.push(Line::from(tags));

    lines.push(Line::styled(np.source_quality.as_str(), style_secondary()));
    lines.push(Line::styled(np.stream_quality.as_str(), style_muted()));
    lines.push(Line::styled(format!("Cover: {}", np.cover_url), style_muted()));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_border())
        .title(" Now playing ");
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_ratings(frame: &mut Frame, area: Rect, view: &PlayerView) {
    let r = &view.rating;
    let line = Line::from(vec![
        Span::styled(
            format!(" + Up {} ", r.thumbs_up),
            style_vote(C_THUMB_UP, r.own == Some(Rating::Up), view.rating_enabled),
        ),
        Span::raw("   "),
        Span::styled(
            format!(" - Down {} ", r.thumbs_down),
            style_vote(C_THUMB_DOWN, r.own == Some(Rating::Down), view.rating_enabled),
        ),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_border())
        .title(" Rate this track ");
    frame.render_widget(Paragraph::new(line).block(block), area);
}

/// `(number, text)` per row; a single placeholder row when empty.
pub fn recent_rows(tracks: &[TrackIdentity]) -> Vec<(String, String)> {
    if tracks.is_empty() {
        return vec![("--".to_string(), "No previous tracks yet".to_string())];
    }
    tracks
        .iter()
        .enumerate()
        .map(|(i, t)| ((i + 1).to_string(), format!("{} - {}", t.artist, t.title)))
        .collect()
}

fn draw_recent(frame: &mut Frame, area: Rect, tracks: &[TrackIdentity]) {
    let lines: Vec<Line> = recent_rows(tracks)
        .into_iter()
        .map(|(num, text)| {
            Line::from(vec![
                Span::styled(format!("{:>3} ", num), style_muted()),
                Span::styled(text, style_default()),
            ])
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_border())
        .title(" Recently played ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(frame: &mut Frame, area: Rect, footer: Option<&str>) {
    let mut spans = vec![Span::styled(KEY_HINTS, style_muted())];
    if let Some(log) = footer {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(log, Style::default().fg(C_ERROR)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
