//! Chat history reconciliation.

use tracing::debug;

use crate::{
    domain::{ChatId, Credentials, MessageKey},
    gateway::{types::HistoryRecord, Gateway},
    transcript::{DisplayMessage, KeyGenerator},
    Result,
};

/// Default number of history records requested when a chat opens.
pub const HISTORY_WINDOW: usize = 100;

/// Normalize raw history records into display order.
///
/// A record is kept only when it carries a direction tag, a non-zero timestamp
/// and some text. Records without a gateway id get a client key. Output is
/// sorted by timestamp ascending; ties keep their input order.
pub fn normalize_history(records: Vec<HistoryRecord>, keys: &KeyGenerator) -> Vec<DisplayMessage> {
    let mut out: Vec<DisplayMessage> = records
        .iter()
        .filter_map(|r| to_display(r, keys))
        .collect();
    out.sort_by_key(|m| m.timestamp);
    out
}

fn to_display(record: &HistoryRecord, keys: &KeyGenerator) -> Option<DisplayMessage> {
    if record.kind.as_deref().map(str::is_empty).unwrap_or(true) {
        return None;
    }
    let timestamp = record.timestamp.filter(|ts| *ts != 0)?;
    let text = record.text()?;

    let id = record
        .id_message
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| MessageKey(id.to_string()))
        .unwrap_or_else(|| keys.mint(timestamp));

    Some(DisplayMessage {
        id,
        text: text.to_string(),
        is_outgoing: record.is_outgoing(),
        timestamp,
    })
}

/// Fetch the last `count` records of a chat and normalize them.
pub async fn load_history(
    gateway: &dyn Gateway,
    creds: &Credentials,
    chat_id: &ChatId,
    count: usize,
    keys: &KeyGenerator,
) -> Result<Vec<DisplayMessage>> {
    let records = gateway.chat_history(creds, chat_id, count).await?;
    let fetched = records.len();
    let messages = normalize_history(records, keys);
    debug!(
        "history for {chat_id}: {fetched} records, {} renderable",
        messages.len()
    );
    Ok(messages)
}

/// Fetch only the unread tail of a chat, using the unread counter from the chat list.
pub async fn unread_history(
    gateway: &dyn Gateway,
    creds: &Credentials,
    chat_id: &ChatId,
    keys: &KeyGenerator,
) -> Result<Vec<DisplayMessage>> {
    let chats = gateway.chats(creds).await?;
    let unread = chats
        .iter()
        .find(|c| c.is_chat(chat_id))
        .map(|c| c.unread_count)
        .unwrap_or(0);

    if unread == 0 {
        return Ok(Vec::new());
    }
    load_history(gateway, creds, chat_id, unread as usize, keys).await
}
