//! Conversation pane: message bubbles, newest at the bottom.

use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::models::{Message, MessageKind};

/// Bubbles take at most this share of the pane width (percent).
const BUBBLE_WIDTH_PCT: usize = 70;

/// What the pane needs to draw.
pub struct ConversationView<'a> {
    pub messages: &'a [Message],
    pub my_id: &'a str,
    /// Lines scrolled up from the bottom (0 = pinned to newest).
    pub scroll_from_bottom: usize,
}

pub fn render(area: Rect, buf: &mut Buffer, view: &ConversationView<'_>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if view.messages.is_empty() {
        let hint = Line::from(Span::styled(
            " No messages yet. Say hi!",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(hint).render(inner, buf);
        return;
    }

    let lines = build_lines(view.messages, view.my_id, inner.width as usize);
    let visible = inner.height as usize;
    let (start, end) = visible_window(lines.len(), visible, view.scroll_from_bottom);

    for (row, line) in lines[start..end].iter().enumerate() {
        let line_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        Paragraph::new(line.clone()).render(line_area, buf);
    }

    if start > 0 {
        let cell = &mut buf[(inner.x + inner.width - 1, inner.y)];
        cell.set_char('^');
        cell.set_style(Style::default().fg(Color::DarkGray));
    }
    if end < lines.len() {
        let cell = &mut buf[(inner.x + inner.width - 1, inner.y + inner.height - 1)];
        cell.set_char('v');
        cell.set_style(Style::default().fg(Color::DarkGray));
    }
}

/// Range of line indices to show, anchored to the bottom.
fn visible_window(total: usize, height: usize, scroll_from_bottom: usize) -> (usize, usize) {
    if total <= height {
        return (0, total);
    }
    let max_scroll = total - height;
    let scroll = scroll_from_bottom.min(max_scroll);
    let end = total - scroll;
    (end - height, end)
}

/// Lay out every message as a bubble: own messages on the right.
pub fn build_lines(messages: &[Message], my_id: &str, width: usize) -> Vec<Line<'static>> {
    let bubble_width = (width * BUBBLE_WIDTH_PCT / 100).max(12).min(width);
    let text_width = bubble_width.saturating_sub(2);
    let mut lines = Vec::new();

    for msg in messages {
        let outgoing = msg.is_from(my_id);
        let (name_style, body_style) = if outgoing {
            (
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
                Style::default().fg(Color::White).bg(Color::Rgb(90, 40, 70)),
            )
        } else {
            (
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                Style::default().fg(Color::Black).bg(Color::Gray),
            )
        };

        let time = msg.timestamp.with_timezone(&Local).format("%H:%M").to_string();
        let header = format!("{}  {}", msg.sender_name, time);
        let header_width = header.width();
        lines.push(align(
            vec![Span::styled(header, name_style)],
            header_width,
            width,
            outgoing,
        ));

        for text in wrap_text(&body_text(msg), text_width) {
            let pad = text_width.saturating_sub(pad_adjust(&text));
            let padded = format!(" {:<w$} ", text, w = pad);
            let w = padded.width();
            lines.push(align(vec![Span::styled(padded, body_style)], w, width, outgoing));
        }

        if outgoing {
            let (tick, color) = if msg.read {
                ("read", Color::Green)
            } else {
                ("sent", Color::DarkGray)
            };
            lines.push(align(
                vec![Span::styled(tick, Style::default().fg(color))],
                tick.len(),
                width,
                true,
            ));
        }

        lines.push(Line::from(""));
    }

    lines
}

/// Text shown inside the bubble.
fn body_text(msg: &Message) -> String {
    match msg.kind {
        MessageKind::Text => msg.content.clone(),
        MessageKind::Voice => {
            // Rough decoded size of the base64 payload
            let payload = msg
                .content
                .split_once(',')
                .map(|(_, b64)| b64.len())
                .unwrap_or(msg.content.len());
            format!("[voice message, {} KB]", (payload * 3 / 4).div_ceil(1024))
        }
    }
}

/// Extra columns taken by wide glyphs, so `{:<w$}` padding (which counts
/// chars) lines bubbles up on screen.
fn pad_adjust(text: &str) -> usize {
    text.width().saturating_sub(text.chars().count())
}

fn align(spans: Vec<Span<'static>>, used: usize, width: usize, right: bool) -> Line<'static> {
    if !right {
        return Line::from(spans);
    }
    let mut out = vec![Span::raw(" ".repeat(width.saturating_sub(used)))];
    out.extend(spans);
    Line::from(out)
}

/// Word-wrap by display width; words longer than a line are split.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        let mut current_w = 0;
        for word in line.split_whitespace() {
            let word_w = word.width();
            let sep = usize::from(!current.is_empty());
            if current_w + sep + word_w <= max_width {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                current_w += sep + word_w;
                continue;
            }
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
                current_w = 0;
            }
            for ch in word.chars() {
                let ch_w = ch.width().unwrap_or(0);
                if current_w + ch_w > max_width {
                    result.push(std::mem::take(&mut current));
                    current_w = 0;
                }
                current.push(ch);
                current_w += ch_w;
            }
        }
        result.push(current);
    }
    if result.is_empty() {
        result.push(String::new());
    }
    result
}
