//! TUI Application state and main event loop

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio_stream::wrappers::BroadcastStream;

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::compose::ComposeState;
use super::log_capture::LogBuffer;
use super::ui;
use crate::api::MessageBackend;
use crate::auth::{SessionEvent, SessionState};
use crate::chat::{Alert, ChatService};
use crate::error::ChatResult;
use crate::models::{Message, User};
use crate::transport::ConnectionState;

/// Redraw / housekeeping interval.
const TICK: Duration = Duration::from_millis(250);

/// Stop advertising typing after this long without a keystroke.
const TYPING_IDLE: Duration = Duration::from_secs(2);

/// Hide the partner's typing indicator if no fresh signal arrives.
const PARTNER_TYPING_TTL: Duration = Duration::from_secs(3);

/// Lines moved per PageUp/PageDown.
const SCROLL_STEP: usize = 5;

/// What the event loop should do in response to input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(String),
    Typing(bool),
    Alert,
    Reconnect,
    Quit,
}

/// Application state
pub struct App {
    pub should_exit: bool,
    pub me: User,
    /// Partner's display name, or a generic label until it is known.
    pub partner_name: String,
    pub partner_online: bool,
    partner_typing_until: Option<Instant>,
    /// Lifecycle of the stored session, driven by the transport state.
    pub session: SessionState,
    /// A manual reconnect is in flight.
    reconnecting: bool,
    pub messages: Vec<Message>,
    /// Lines scrolled up from the newest message.
    pub scroll: usize,
    pub compose: ComposeState,
    typing_sent: bool,
    last_keystroke: Option<Instant>,
    pub status_message: Option<String>,
    pub status_is_error: bool,
    pub last_log: Option<String>,
}

impl App {
    /// State for a stored session whose first handshake is still pending.
    pub fn new(me: User) -> Self {
        let mut session = SessionState::default();
        session.apply(SessionEvent::LoginStarted);

        Self {
            should_exit: false,
            me,
            partner_name: "your partner".to_string(),
            partner_online: false,
            partner_typing_until: None,
            session,
            reconnecting: false,
            messages: Vec::new(),
            scroll: 0,
            compose: ComposeState::default(),
            typing_sent: false,
            last_keystroke: None,
            status_message: None,
            status_is_error: false,
            last_log: None,
        }
    }

    pub fn partner_typing(&self) -> bool {
        self.partner_typing_until.is_some()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting
    }

    /// Text for the connection slot of the status bar.
    pub fn connection_label(&self) -> &'static str {
        if self.reconnecting {
            "Reconnecting"
        } else {
            self.session.as_str()
        }
    }

    pub fn set_status(&mut self, msg: impl Into<String>, is_error: bool) {
        self.status_message = Some(msg.into());
        self.status_is_error = is_error;
    }

    /// Translate a key press into state changes and outbound actions.
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Vec<Action> {
        if key.kind != KeyEventKind::Press {
            return vec![];
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let mut actions = Vec::new();

        match key.code {
            KeyCode::Esc => self.quit(&mut actions),
            KeyCode::Char('c') if ctrl => self.quit(&mut actions),
            KeyCode::Char('a') if ctrl => {
                // Alerts only travel over the socket
                if self.session == SessionState::Connected {
                    actions.push(Action::Alert);
                    self.set_status(format!("Alert sent to {}", self.partner_name), false);
                } else {
                    self.set_status(
                        "Not connected; alert not sent. Press Ctrl-R to reconnect.",
                        true,
                    );
                }
            }
            KeyCode::Char('r') if ctrl => {
                if self.session.can_reconnect() && !self.reconnecting {
                    actions.push(Action::Reconnect);
                    self.reconnecting = true;
                    self.set_status("Reconnecting...", false);
                } else {
                    let state = self.connection_label().to_lowercase();
                    self.set_status(format!("Already {}", state), false);
                }
            }
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Enter => {
                if let Some(text) = self.compose.take() {
                    self.stop_typing(&mut actions);
                    actions.push(Action::Send(text));
                    self.scroll = 0;
                }
            }
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_add(SCROLL_STEP),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_sub(SCROLL_STEP),
            KeyCode::Char(c) if !ctrl => {
                self.compose.insert_char(c);
                self.last_keystroke = Some(now);
                if !self.typing_sent {
                    self.typing_sent = true;
                    actions.push(Action::Typing(true));
                }
            }
            _ => {}
        }

        actions
    }

    /// Expire typing state on both sides.
    pub fn on_tick(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();

        let idle = self
            .last_keystroke
            .is_some_and(|t| now.duration_since(t) >= TYPING_IDLE);
        if self.typing_sent && idle {
            self.stop_typing(&mut actions);
        }

        if self.partner_typing_until.is_some_and(|until| now >= until) {
            self.partner_typing_until = None;
        }

        actions
    }

    pub fn set_partner(&mut self, partner: Option<User>) {
        if let Some(p) = partner {
            self.partner_name = p.name;
            self.partner_online = p.is_online;
        }
    }

    pub fn set_partner_typing(&mut self, is_typing: bool, now: Instant) {
        self.partner_typing_until = is_typing.then(|| now + PARTNER_TYPING_TTL);
    }

    /// Feed a transport state change into the session lifecycle.
    ///
    /// The first successful handshake confirms the stored login; later ones
    /// restore a dropped session.
    pub fn set_connection(&mut self, state: ConnectionState) {
        match state {
            ConnectionState::Connected => {
                let was_connected = self.session == SessionState::Connected;
                let event = if self.session == SessionState::Authenticating {
                    SessionEvent::LoginSucceeded
                } else {
                    SessionEvent::TransportRestored
                };
                self.session.apply(event);
                self.reconnecting = false;
                if !was_connected {
                    self.status_message = None;
                    self.status_is_error = false;
                }
            }
            ConnectionState::Disconnected => {
                self.session.apply(SessionEvent::TransportLost);
                self.reconnecting = false;
                self.partner_typing_until = None;
                self.set_status("Disconnected. Press Ctrl-R to reconnect.", true);
            }
            ConnectionState::Connecting => {}
        }
    }

    pub fn on_alert(&mut self, alert: Alert) {
        self.set_status(format!("{} is trying to reach you!", alert.from), false);
    }

    pub fn on_send_result(&mut self, result: ChatResult<Message>) {
        match result {
            Ok(_) => {
                if self.status_is_error {
                    self.status_message = None;
                    self.status_is_error = false;
                }
            }
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    /// Keep the newest captured log line for the status bar.
    pub fn drain_logs(&mut self, logs: &LogBuffer) {
        if let Some(line) = logs.drain().pop() {
            self.last_log = Some(line);
        }
    }

    fn stop_typing(&mut self, actions: &mut Vec<Action>) {
        if self.typing_sent {
            self.typing_sent = false;
            actions.push(Action::Typing(false));
        }
    }

    /// The final `typing(false)` is left to the caller, which sends it
    /// straight to the transport ahead of the disconnect.
    fn quit(&mut self, actions: &mut Vec<Action>) {
        self.typing_sent = false;
        self.should_exit = true;
        actions.push(Action::Quit);
    }

    /// Render the UI
    pub fn render(&self, frame: &mut ratatui::Frame) {
        ui::render(frame, self);
    }
}

/// Run the chat screen until the user quits.
///
/// The terminal is restored on every exit path, including errors.
pub async fn run<B: MessageBackend>(service: Arc<ChatService<B>>, logs: LogBuffer) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, service, &logs).await;
    ratatui::restore();
    result
}

async fn run_app<B: MessageBackend>(
    terminal: &mut DefaultTerminal,
    service: Arc<ChatService<B>>,
    logs: &LogBuffer,
) -> Result<()> {
    let mut app = App::new(service.me().clone());
    let mut backend = Backend::start(Arc::clone(&service));

    let mut messages = service.store().subscribe();
    let mut online = service.presence().subscribe_partner_online();
    let mut partner = service.presence().subscribe_partner();
    let mut connection = service.transport().subscribe_state();
    let mut typing = BroadcastStream::new(service.presence().subscribe_typing());
    let mut alerts = BroadcastStream::new(service.presence().subscribe_alerts());

    app.messages = messages.borrow_and_update().clone();
    app.set_partner(partner.borrow_and_update().clone());
    app.partner_online = *online.borrow_and_update();
    app.set_connection(*connection.borrow_and_update());

    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK);

    while !app.should_exit {
        terminal.draw(|frame| app.render(frame))?;

        let actions = tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => app.handle_key(key, Instant::now()),
                Some(Ok(_)) => vec![],
                Some(Err(e)) => return Err(e.into()),
                None => vec![Action::Quit],
            },
            Ok(()) = messages.changed() => {
                app.messages = messages.borrow_and_update().clone();
                vec![]
            }
            Ok(()) = online.changed() => {
                app.partner_online = *online.borrow_and_update();
                vec![]
            }
            Ok(()) = partner.changed() => {
                app.set_partner(partner.borrow_and_update().clone());
                vec![]
            }
            Ok(()) = connection.changed() => {
                app.set_connection(*connection.borrow_and_update());
                vec![]
            }
            Some(signal) = typing.next() => {
                // Lagged receivers just skip ahead
                if let Ok(is_typing) = signal {
                    app.set_partner_typing(is_typing, Instant::now());
                }
                vec![]
            }
            Some(signal) = alerts.next() => {
                if let Ok(alert) = signal {
                    app.on_alert(alert);
                }
                vec![]
            }
            Some(resp) = backend.recv() => {
                match resp {
                    BackendResponse::MessageSent(result) => app.on_send_result(result),
                }
                vec![]
            }
            _ = tick.tick() => {
                app.drain_logs(logs);
                app.on_tick(Instant::now())
            }
        };

        for action in actions {
            match action {
                Action::Send(text) => backend.send(BackendCommand::SendMessage(text)),
                Action::Typing(is_typing) => backend.send(BackendCommand::Typing(is_typing)),
                Action::Alert => backend.send(BackendCommand::Alert),
                Action::Reconnect => backend.send(BackendCommand::Reconnect),
                Action::Quit => app.should_exit = true,
            }
        }
    }

    Ok(())
}
