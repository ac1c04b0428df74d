//! Outbound text with optimistic rendering.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    domain::{ChatId, Credentials, MessageKey},
    errors::Error,
    events::ChatEvent,
    gateway::Gateway,
    transcript::{now_seconds, DisplayMessage, KeyGenerator, TranscriptUpdate},
    Result,
};

/// Send `text` to `chat_id`, showing it in the transcript before the gateway answers.
///
/// The optimistic entry gets a client key up front. If the gateway call fails,
/// exactly that entry is removed and the error is returned for inline display.
/// On success the entry stays as is.
pub async fn send_text(
    gateway: &dyn Gateway,
    creds: &Credentials,
    chat_id: &ChatId,
    text: &str,
    keys: &KeyGenerator,
    events: &mpsc::UnboundedSender<ChatEvent>,
) -> Result<MessageKey> {
    if text.trim().is_empty() {
        return Err(Error::Validation("Message is empty".to_string()));
    }

    let timestamp = now_seconds();
    let key = keys.mint(timestamp);
    let optimistic = DisplayMessage {
        id: key.clone(),
        text: text.to_string(),
        is_outgoing: true,
        timestamp,
    };
    let _ = events.send(ChatEvent::Transcript(TranscriptUpdate::Append(optimistic)));

    match gateway.send_message(creds, chat_id, text).await {
        Ok(sent) => {
            debug!("message {key} accepted by gateway as {}", sent.id_message);
            Ok(key)
        }
        Err(e) => {
            warn!("send to {chat_id} failed: {e}");
            let _ = events.send(ChatEvent::Transcript(TranscriptUpdate::Remove(key)));
            Err(e)
        }
    }
}
