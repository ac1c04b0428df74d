use crate::{
    domain::ReceiptId,
    transcript::{DisplayMessage, TranscriptUpdate},
};

/// Outcome of one poll tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollEvent {
    /// Queue was empty.
    Empty,
    /// A message for the active chat.
    Message(DisplayMessage),
    /// A notification that was acknowledged but not rendered.
    Ignored { receipt: ReceiptId },
    /// The tick failed; the loop keeps running.
    Failed(String),
}

/// Everything that flows into the chat view's single apply step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Poll(PollEvent),
    Transcript(TranscriptUpdate),
}

impl ChatEvent {
    /// The transcript change this event carries, if any.
    pub fn into_update(self) -> Option<TranscriptUpdate> {
        match self {
            ChatEvent::Poll(PollEvent::Message(msg)) => Some(TranscriptUpdate::Append(msg)),
            ChatEvent::Poll(_) => None,
            ChatEvent::Transcript(update) => Some(update),
        }
    }
}
