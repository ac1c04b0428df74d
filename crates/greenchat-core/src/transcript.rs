//! In-memory chat transcript.
//!
//! The transcript is never edited in place by callers: every change is a
//! `TranscriptUpdate` applied against the latest state, so a poll tick and a
//! send finishing close together cannot overwrite each other.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::domain::MessageKey;

/// A message as shown in the chat view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayMessage {
    pub id: MessageKey,
    pub text: String,
    pub is_outgoing: bool,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptUpdate {
    /// Live message in arrival order; ignored if its key is already shown.
    Append(DisplayMessage),
    /// History batch; entries whose key is already present are dropped.
    MergeHistory(Vec<DisplayMessage>),
    /// Roll back one optimistic entry.
    Remove(MessageKey),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<DisplayMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageKey) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    pub fn apply(&mut self, update: TranscriptUpdate) {
        match update {
            TranscriptUpdate::Append(msg) => {
                if !self.contains(&msg.id) {
                    self.messages.push(msg);
                }
            }
            TranscriptUpdate::MergeHistory(batch) => self.merge(batch),
            TranscriptUpdate::Remove(id) => self.messages.retain(|m| m.id != id),
        }
    }

    fn merge(&mut self, batch: Vec<DisplayMessage>) {
        let mut known: HashSet<MessageKey> = self.messages.iter().map(|m| m.id.clone()).collect();
        for msg in batch {
            if known.insert(msg.id.clone()) {
                self.messages.push(msg);
            }
        }
    }
}

/// Mints client-side message keys. Each key is assigned once and reused for rollback.
#[derive(Debug, Default)]
pub struct KeyGenerator {
    next: AtomicU64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, timestamp: i64) -> MessageKey {
        let seq = self.next.fetch_add(1, Ordering::SeqCst);
        MessageKey(format!("local-{timestamp}-{seq}"))
    }
}

/// Current wall-clock time in epoch seconds.
pub fn now_seconds() -> i64 {
    Utc::now().timestamp()
}
