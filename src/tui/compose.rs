//! Compose line: single-line text input with key hints.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// State for the compose line.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
}

impl ComposeState {
    /// Insert a character at the current cursor position.
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    /// Delete the character before the cursor (backspace).
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let prev_byte_pos = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(prev_byte_pos..byte_pos);
            self.cursor_pos -= 1;
        }
    }

    /// Delete the character at the cursor (delete key).
    pub fn delete(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let next_byte_pos = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(byte_pos..next_byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor_pos < self.input.chars().count() {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    /// Clear all input text (Ctrl+U).
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Take the text to send and clear the line.
    /// Returns None if the input is empty or whitespace-only.
    pub fn take(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.clear();
        Some(text)
    }

    /// Convert a char-based cursor position to a byte offset.
    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Height of the compose box: border + input + hints + border.
pub const COMPOSE_HEIGHT: u16 = 4;

const HINTS: &str = " Enter send  Ctrl-A alert  Ctrl-R reconnect  PgUp/PgDn scroll  Esc quit";

/// Render the compose box and place the terminal cursor in it.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, partner: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let display = visible_input(&state.input, state.cursor_pos, input_area.width as usize);
    render_input(input_area, frame.buffer_mut(), state, &display, partner);
    frame.set_cursor_position((input_area.x + 1 + display.cursor_col as u16, input_area.y));

    if inner.height >= 2 {
        let hints_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);
        let hints: String = HINTS.chars().take(hints_area.width as usize).collect();
        Paragraph::new(Line::from(Span::styled(
            hints,
            Style::default().fg(Color::DarkGray),
        )))
        .render(hints_area, frame.buffer_mut());
    }
}

fn render_input(
    area: Rect,
    buf: &mut Buffer,
    state: &ComposeState,
    display: &VisibleInput,
    partner: &str,
) {
    let line = if state.input.is_empty() {
        let placeholder = format!(" Type a message to {}...", partner);
        let truncated: String = placeholder.chars().take(area.width as usize).collect();
        Line::from(Span::styled(truncated, Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(Span::styled(
            format!(" {}", display.text),
            Style::default().fg(Color::White),
        ))
    };
    Paragraph::new(line).render(area, buf);
}

/// Slice of the input that fits on screen, and the cursor column within it.
struct VisibleInput {
    text: String,
    cursor_col: usize,
}

/// Scroll the input horizontally so the cursor stays visible.
///
/// Widths are measured in terminal columns, so wide glyphs count double.
fn visible_input(input: &str, cursor_pos: usize, width: usize) -> VisibleInput {
    // One column of left margin
    let avail = width.saturating_sub(2);
    let chars: Vec<char> = input.chars().collect();
    let col = |c: &char| c.width().unwrap_or(0);

    let mut start = 0;
    let cursor_col = |start: usize| {
        chars[start..cursor_pos.min(chars.len())]
            .iter()
            .map(col)
            .sum::<usize>()
    };
    while start < cursor_pos && cursor_col(start) > avail {
        start += 1;
    }

    let mut text = String::new();
    let mut used = 0;
    for c in &chars[start..] {
        let w = col(c);
        if used + w > avail {
            break;
        }
        used += w;
        text.push(*c);
    }

    VisibleInput {
        text,
        cursor_col: cursor_col(start),
    }
}
