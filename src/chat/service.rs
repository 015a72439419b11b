//! Conversation synchronization: HTTP persistence, live fan-out, inbound events
//!
//! Outgoing changes are persisted over HTTP first; only on success is local
//! state updated and the event emitted to the peer. Delivery is decided by the
//! HTTP call alone; the live event is a best-effort echo.

use tokio::sync::mpsc;

use super::presence::PresenceTracker;
use super::store::ConversationStore;
use crate::api::MessageBackend;
use crate::auth::Session;
use crate::error::{ChatError, ChatResult};
use crate::models::{Message, MessageKind, NewMessage, User};
use crate::transport::{OutboundEvent, Transport, TransportEvent};

pub struct ChatService<B> {
    backend: B,
    me: User,
    store: ConversationStore,
    presence: PresenceTracker,
    transport: Transport,
}

impl<B: MessageBackend> ChatService<B> {
    pub fn new(backend: B, session: &Session, transport: Transport) -> Self {
        Self {
            backend,
            me: session.user.clone(),
            store: ConversationStore::new(),
            presence: PresenceTracker::new(),
            transport,
        }
    }

    pub fn me(&self) -> &User {
        &self.me
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Fetch the full history and replace local state with it.
    pub async fn load_initial(&self) -> ChatResult<Vec<Message>> {
        let history = self.backend.fetch_messages().await?;
        self.store.replace_all(history);
        Ok(self.store.snapshot())
    }

    /// Look up the partner by name and seed presence from the record.
    pub async fn load_partner(&self, name: &str) -> ChatResult<User> {
        let partner = self.backend.fetch_partner(name).await?;
        tracing::info!(
            "Partner {} is {}",
            partner.name,
            if partner.is_online { "online" } else { "offline" }
        );
        self.presence.set_partner(partner.clone());
        Ok(partner)
    }

    /// Persist a new message, then append it locally and emit it live.
    ///
    /// On failure nothing is appended and nothing is emitted. There is no
    /// automatic retry.
    pub async fn send(&self, content: &str, kind: MessageKind) -> ChatResult<Message> {
        if content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let draft = NewMessage::new(&self.me, content, kind);
        let saved = match self.backend.create_message(&draft).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!("Error sending {} message: {:#}", kind.as_str(), e);
                return Err(ChatError::Send(e));
            }
        };

        self.store.append(saved.clone());
        self.transport.emit(OutboundEvent::Message(saved.clone()));
        Ok(saved)
    }

    /// Persist a read receipt, then mark locally and notify the sender.
    pub async fn mark_read(&self, id: &str) -> ChatResult<()> {
        self.backend
            .mark_read(id)
            .await
            .map_err(|source| ChatError::MarkRead {
                id: id.to_string(),
                source,
            })?;

        self.store.mark_read(id);
        self.transport
            .emit(OutboundEvent::MessageRead(id.to_string()));
        Ok(())
    }

    pub fn send_typing(&self, is_typing: bool) {
        self.transport.emit(OutboundEvent::Typing(is_typing));
    }

    pub fn send_alert(&self) {
        self.transport.emit(OutboundEvent::Alert);
    }

    /// Apply one inbound transport event.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                tracing::info!("Connected to socket server");
                if let Err(e) = self.backend.set_online(true).await {
                    tracing::warn!("Failed to publish online status: {:#}", e);
                }
            }
            TransportEvent::Disconnected => {
                tracing::info!("Disconnected from socket server");
            }
            TransportEvent::Message(msg) => {
                let id = msg.id.clone();
                let incoming_unread = !msg.is_from(&self.me.id) && !msg.read;
                if self.store.append(msg) && incoming_unread {
                    if let Err(e) = self.mark_read(&id).await {
                        tracing::warn!("{}", e);
                    }
                }
            }
            TransportEvent::MessageRead(id) => {
                self.store.mark_read(&id);
            }
            TransportEvent::Typing(is_typing) => {
                self.presence.notify_typing(is_typing);
            }
            TransportEvent::PartnerStatus(is_online) => {
                self.presence.set_partner_online(is_online);
            }
            TransportEvent::Alert => {
                let alert = self.presence.notify_alert();
                tracing::info!("{} is trying to reach you!", alert.from);
            }
        }
    }

    /// Apply inbound events until the transport's channel closes.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("Transport event channel closed");
    }

    /// Publish offline status and close the connection.
    pub async fn shutdown(&self) {
        self.transport.disconnect();
        if let Err(e) = self.backend.set_online(false).await {
            tracing::warn!("Failed to publish offline status: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Command;
    use anyhow::{bail, Result};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        history: Vec<Message>,
        partner: Option<User>,
        fail_create: AtomicBool,
        next_id: AtomicUsize,
        created: Mutex<Vec<NewMessage>>,
        read_calls: Mutex<Vec<String>>,
        status_calls: Mutex<Vec<bool>>,
    }

    impl MessageBackend for FakeBackend {
        async fn fetch_messages(&self) -> Result<Vec<Message>> {
            Ok(self.history.clone())
        }

        async fn create_message(&self, draft: &NewMessage) -> Result<Message> {
            if self.fail_create.load(Ordering::SeqCst) {
                bail!("HTTP 500 for /messages: boom");
            }
            self.created.lock().unwrap().push(draft.clone());
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(Message {
                id: format!("srv-{}", n),
                sender_id: draft.sender_id.clone(),
                sender_name: draft.sender_name.clone(),
                content: draft.content.clone(),
                kind: draft.kind,
                timestamp: draft.timestamp,
                read: draft.read,
            })
        }

        async fn mark_read(&self, id: &str) -> Result<Message> {
            self.read_calls.lock().unwrap().push(id.to_string());
            Ok(stub_message(id))
        }

        async fn fetch_partner(&self, name: &str) -> Result<User> {
            match self.partner {
                Some(ref p) if p.name == name => Ok(p.clone()),
                _ => bail!("HTTP 404 for /users/partner/{}: not found", name),
            }
        }

        async fn set_online(&self, is_online: bool) -> Result<User> {
            self.status_calls.lock().unwrap().push(is_online);
            Ok(user("u1", "Allu"))
        }
    }

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.into(),
            name: name.into(),
            is_online: true,
        }
    }

    fn stub_message(id: &str) -> Message {
        Message {
            id: id.into(),
            sender_id: "u2".into(),
            sender_name: "Safa".into(),
            content: "hi".into(),
            kind: MessageKind::Text,
            timestamp: chrono::Utc::now(),
            read: false,
        }
    }

    fn service_for(
        me: User,
        backend: FakeBackend,
    ) -> (ChatService<FakeBackend>, mpsc::UnboundedReceiver<Command>) {
        let (transport, commands) = Transport::detached();
        let session = Session::new("tok".into(), me);
        (ChatService::new(backend, &session, transport), commands)
    }

    fn emitted(commands: &mut mpsc::UnboundedReceiver<Command>) -> Vec<OutboundEvent> {
        let mut out = Vec::new();
        while let Ok(cmd) = commands.try_recv() {
            if let Command::Emit(ev) = cmd {
                out.push(ev);
            }
        }
        out
    }

    #[tokio::test]
    async fn test_send_appends_and_emits_same_id() {
        let (svc, mut commands) = service_for(user("u1", "Allu"), FakeBackend::default());

        let saved = svc.send("hello", MessageKind::Text).await.unwrap();

        let last = svc.store().last().unwrap();
        assert_eq!(last.content, "hello");
        assert_eq!(last.kind, MessageKind::Text);
        assert!(!last.read);
        assert_eq!(last.id, saved.id);

        let events = emitted(&mut commands);
        assert_eq!(events.len(), 1);
        match &events[0] {
            OutboundEvent::Message(m) => assert_eq!(m.id, last.id),
            other => panic!("unexpected emit {:?}", other),
        }

        let created = svc.backend().created.lock().unwrap();
        assert_eq!(created[0].sender_id, "u1");
        assert_eq!(created[0].sender_name, "Allu");
    }

    #[tokio::test]
    async fn test_send_failure_leaves_state_untouched() {
        let backend = FakeBackend::default();
        backend.fail_create.store(true, Ordering::SeqCst);
        let (svc, mut commands) = service_for(user("u1", "Allu"), backend);

        let err = svc.send("hello", MessageKind::Text).await.unwrap_err();
        assert!(matches!(err, ChatError::Send(_)));
        assert!(svc.store().is_empty());
        assert!(emitted(&mut commands).is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected_before_http() {
        let (svc, mut commands) = service_for(user("u1", "Allu"), FakeBackend::default());
        let err = svc.send("   ", MessageKind::Text).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(svc.backend().created.lock().unwrap().is_empty());
        assert!(emitted(&mut commands).is_empty());
    }

    #[tokio::test]
    async fn test_message_reaches_peer_exactly_once() {
        let (alice, mut alice_out) = service_for(user("u1", "Allu"), FakeBackend::default());
        let (bob, mut bob_out) = service_for(user("u2", "Safa"), FakeBackend::default());

        let sent = alice.send("hi", MessageKind::Text).await.unwrap();
        let live = match emitted(&mut alice_out).pop() {
            Some(OutboundEvent::Message(m)) => m,
            other => panic!("expected message emit, got {:?}", other),
        };

        // Live event plus a duplicate delivery of the same id
        bob.handle_event(TransportEvent::Message(live.clone())).await;
        bob.handle_event(TransportEvent::Message(live)).await;

        assert_eq!(bob.store().len(), 1);
        assert!(bob.store().get(&sent.id).unwrap().read);
        assert_eq!(*bob.backend().read_calls.lock().unwrap(), vec![sent.id.clone()]);
        assert_eq!(
            emitted(&mut bob_out),
            vec![OutboundEvent::MessageRead(sent.id.clone())]
        );

        // Receipt flows back to the sender
        alice
            .handle_event(TransportEvent::MessageRead(sent.id.clone()))
            .await;
        assert!(alice.store().get(&sent.id).unwrap().read);
        assert_eq!(alice.store().len(), 1);
    }

    #[tokio::test]
    async fn test_own_echo_is_not_acknowledged() {
        let (svc, mut commands) = service_for(user("u1", "Allu"), FakeBackend::default());
        let saved = svc.send("hello", MessageKind::Text).await.unwrap();
        emitted(&mut commands);

        svc.handle_event(TransportEvent::Message(saved)).await;
        assert_eq!(svc.store().len(), 1);
        assert!(svc.backend().read_calls.lock().unwrap().is_empty());
        assert!(emitted(&mut commands).is_empty());
    }

    #[tokio::test]
    async fn test_presence_and_typing_events() {
        let (svc, _commands) = service_for(user("u1", "Allu"), FakeBackend::default());
        let mut typing = svc.presence().subscribe_typing();

        svc.handle_event(TransportEvent::PartnerStatus(true)).await;
        svc.handle_event(TransportEvent::PartnerStatus(false)).await;
        assert!(!svc.presence().partner_online());

        svc.handle_event(TransportEvent::Typing(true)).await;
        assert!(typing.recv().await.unwrap());
    }

    #[tokio::test]
    async fn test_connected_publishes_online_status() {
        let (svc, _commands) = service_for(user("u1", "Allu"), FakeBackend::default());
        svc.handle_event(TransportEvent::Connected).await;
        svc.handle_event(TransportEvent::Disconnected).await;
        assert_eq!(*svc.backend().status_calls.lock().unwrap(), vec![true]);

        svc.shutdown().await;
        assert_eq!(*svc.backend().status_calls.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_typing_stop_goes_out_before_disconnect() {
        let (svc, mut commands) = service_for(user("u1", "Allu"), FakeBackend::default());
        svc.send_typing(false);
        svc.shutdown().await;

        let queued: Vec<Command> = std::iter::from_fn(|| commands.try_recv().ok()).collect();
        assert_eq!(queued.len(), 2);
        assert!(matches!(
            queued[0],
            Command::Emit(OutboundEvent::Typing(false))
        ));
        assert!(matches!(queued[1], Command::Disconnect));
    }

    #[tokio::test]
    async fn test_load_initial_and_partner() {
        let backend = FakeBackend {
            history: vec![stub_message("h1"), stub_message("h2")],
            partner: Some(User {
                id: "u2".into(),
                name: "Safa".into(),
                is_online: true,
            }),
            ..FakeBackend::default()
        };
        let (svc, _commands) = service_for(user("u1", "Allu"), backend);
        svc.store().append(stub_message("stale"));

        let loaded = svc.load_initial().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(svc.store().get("stale").is_none());

        let partner = svc.load_partner("Safa").await.unwrap();
        assert_eq!(partner.id, "u2");
        assert!(svc.presence().partner_online());
        assert!(svc.load_partner("Nobody").await.is_err());
    }

    #[tokio::test]
    async fn test_run_drains_events_until_closed() {
        let (svc, _commands) = service_for(user("u1", "Allu"), FakeBackend::default());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(TransportEvent::PartnerStatus(true)).unwrap();
        tx.send(TransportEvent::MessageRead("later".into())).unwrap();
        drop(tx);

        svc.run(rx).await;
        assert!(svc.presence().partner_online());
        assert_eq!(svc.store().pending_read_count(), 1);
    }
}
