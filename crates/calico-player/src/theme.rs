//! Color palette and styles for the player.

use ratatui::style::{Color, Modifier, Style};

use crate::session::Indicator;

pub const C_ACCENT: Color = Color::Rgb(255, 95, 95);
pub const C_LIVE: Color = Color::Rgb(80, 200, 120);
pub const C_ERROR: Color = Color::Rgb(255, 80, 80);
pub const C_MUTED: Color = Color::Rgb(72, 72, 88);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_PANEL_BORDER: Color = Color::Rgb(40, 40, 52);
pub const C_TAG: Color = Color::Rgb(80, 140, 200);
pub const C_THUMB_UP: Color = Color::Rgb(80, 200, 120);
pub const C_THUMB_DOWN: Color = Color::Rgb(255, 184, 80);

pub fn style_default() -> Style {
    Style::default().fg(C_PRIMARY)
}

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY)
}

pub fn style_muted() -> Style {
    Style::default().fg(C_MUTED)
}

pub fn style_title() -> Style {
    Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn style_border() -> Style {
    Style::default().fg(C_PANEL_BORDER)
}

pub fn style_tag() -> Style {
    Style::default().fg(C_TAG)
}

pub fn style_status(indicator: Indicator) -> Style {
    match indicator {
        Indicator::Idle => style_secondary(),
        Indicator::Live => Style::default().fg(C_LIVE).add_modifier(Modifier::BOLD),
        Indicator::Error => Style::default().fg(C_ERROR),
    }
}

/// Vote control: highlighted when it is the listener's own vote, dimmed
/// while disabled.
pub fn style_vote(color: Color, selected: bool, enabled: bool) -> Style {
    match (selected, enabled) {
        (true, _) => Style::default()
            .fg(Color::Black)
            .bg(color)
            .add_modifier(Modifier::BOLD),
        (false, true) => Style::default().fg(color),
        (false, false) => style_muted(),
    }
}
