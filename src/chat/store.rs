//! Conversation store: the ordered, id-deduplicated message list
//!
//! Order is insertion order, not timestamp order. Entries are only ever
//! appended or marked read. Subscribers get the whole list again after every
//! change; calls that change nothing don't wake them.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::models::Message;

/// Early read receipts held at once; the oldest is dropped beyond this.
const MAX_PENDING_READS: usize = 256;

#[derive(Default)]
struct Inner {
    ids: HashSet<String>,
    /// Read receipts that arrived before their message, oldest first.
    pending_reads: VecDeque<String>,
}

impl Inner {
    fn take_pending_read(&mut self, id: &str) -> bool {
        match self.pending_reads.iter().position(|p| p == id) {
            Some(pos) => {
                self.pending_reads.remove(pos);
                true
            }
            None => false,
        }
    }

    fn hold_read(&mut self, id: &str) {
        if self.pending_reads.iter().any(|p| p == id) {
            return;
        }
        if self.pending_reads.len() >= MAX_PENDING_READS {
            if let Some(dropped) = self.pending_reads.pop_front() {
                tracing::debug!("Dropping stale read receipt for {}", dropped);
            }
        }
        self.pending_reads.push_back(id.to_string());
    }
}

/// Shared handle to the conversation. Clones see the same state.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<Mutex<Inner>>,
    messages: watch::Sender<Vec<Message>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (messages, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            messages,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the whole conversation (initial history load).
    ///
    /// Duplicate ids in `history` keep their first occurrence. Pending read
    /// receipts are applied to matching entries and the rest are discarded,
    /// since the loaded history is the server's full conversation.
    pub fn replace_all(&self, history: Vec<Message>) {
        let mut inner = self.lock();
        inner.ids.clear();

        let mut deduped = Vec::with_capacity(history.len());
        for mut msg in history {
            if !inner.ids.insert(msg.id.clone()) {
                tracing::debug!("Dropping duplicate history entry {}", msg.id);
                continue;
            }
            if inner.take_pending_read(&msg.id) {
                msg.read = true;
            }
            deduped.push(msg);
        }
        if !inner.pending_reads.is_empty() {
            tracing::debug!(
                "Discarding {} read receipts with no message",
                inner.pending_reads.len()
            );
            inner.pending_reads.clear();
        }

        tracing::debug!("Conversation loaded: {} messages", deduped.len());
        self.messages.send_replace(deduped);
    }

    /// Append `msg` unless an entry with the same id already exists.
    ///
    /// Returns `true` if the conversation changed.
    pub fn append(&self, mut msg: Message) -> bool {
        let mut inner = self.lock();
        if !inner.ids.insert(msg.id.clone()) {
            tracing::trace!("Message {} already present", msg.id);
            return false;
        }
        if inner.take_pending_read(&msg.id) {
            tracing::debug!("Applying early read receipt to {}", msg.id);
            msg.read = true;
        }
        self.messages.send_modify(|list| list.push(msg));
        true
    }

    /// Mark the message with `id` as read.
    ///
    /// Returns `true` if an entry flipped from unread to read. If the message
    /// isn't here yet, the receipt is held and applied when it arrives.
    pub fn mark_read(&self, id: &str) -> bool {
        let mut inner = self.lock();
        if !inner.ids.contains(id) {
            tracing::debug!("Read receipt for unknown message {}; holding", id);
            inner.hold_read(id);
            return false;
        }
        self.messages.send_if_modified(|list| {
            match list.iter_mut().find(|m| m.id == id) {
                Some(m) if !m.read => {
                    m.read = true;
                    true
                }
                _ => false,
            }
        })
    }

    /// Current conversation, in display order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<Message> {
        self.messages.borrow().iter().find(|m| m.id == id).cloned()
    }

    pub fn last(&self) -> Option<Message> {
        self.messages.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of read receipts waiting for their message.
    pub fn pending_read_count(&self) -> usize {
        self.lock().pending_reads.len()
    }

    /// Observe the conversation; the receiver always holds the latest list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.subscribe()
    }
}
