//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};

use super::app::App;
use super::compose;
use super::messages::{self, ConversationView};
use crate::auth::SessionState;

/// Returns status indicator symbol and color based on online state
fn status_indicator(is_online: bool) -> (&'static str, Color) {
    if is_online {
        ("*", Color::Green)
    } else {
        ("o", Color::Red)
    }
}

fn session_color(app: &App) -> Color {
    match app.session {
        SessionState::Connected => Color::Green,
        SessionState::Authenticating => Color::Yellow,
        SessionState::Disconnected if app.is_reconnecting() => Color::Yellow,
        SessionState::Disconnected | SessionState::LoggedOut => Color::Red,
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Layout: header (1 line) + messages + compose box + status bar (1 line)
    let [header_area, messages_area, compose_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        &ConversationView {
            messages: &app.messages,
            my_id: &app.me.id,
            scroll_from_bottom: app.scroll,
        },
    );

    compose::render(compose_area, frame, &app.compose, &app.partner_name);

    render_status(status_area, frame.buffer_mut(), app);
}

/// Header: partner, presence and typing on the left, our name on the right.
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = format!(" {}", app.partner_name);
    let (status_symbol, status_color) = status_indicator(app.partner_online);
    let presence = format!(
        " {} {} ",
        status_symbol,
        if app.partner_online { "online" } else { "offline" }
    );
    let typing = if app.partner_typing() { " typing..." } else { "" };
    let me = format!(" {} ", app.me.name);

    let left_width = title.len() + presence.len() + typing.len();
    let padding_width = (area.width as usize).saturating_sub(left_width + me.len());

    let header_line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(presence, Style::default().fg(status_color)),
        Span::styled(
            typing,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ),
        Span::raw(" ".repeat(padding_width)),
        Span::styled(me, Style::default().fg(Color::Cyan)),
    ]);

    Paragraph::new(header_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the status bar
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    let connection = Span::styled(
        format!(" {} ", app.connection_label()),
        Style::default().fg(session_color(app)),
    );
    let sep = Span::styled(" | ", Style::default().fg(Color::Gray));

    let detail = match (&app.status_message, &app.last_log) {
        (Some(msg), _) => {
            let style = if app.status_is_error {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::Green)
            };
            Span::styled(msg.clone(), style)
        }
        (None, Some(log)) => Span::styled(log.clone(), Style::default().fg(Color::Gray)),
        (None, None) => Span::styled(
            format!("{} messages", app.messages.len()),
            Style::default().fg(Color::Gray),
        ),
    };

    Paragraph::new(Line::from(vec![connection, sep, detail]))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
