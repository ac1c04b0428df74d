use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::domain::{ChatId, ReceiptId};

/// `sendMessage` response.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id_message: String,
}

// ============== Notifications ==============

/// One entry from the notification queue.
///
/// Only `receiptId` is required. A body that does not decode becomes `None`
/// so the entry can still be acknowledged.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawNotification {
    pub receipt_id: i64,
    #[serde(default, deserialize_with = "lenient_body")]
    pub body: Option<NotificationBody>,
}

impl RawNotification {
    pub fn receipt(&self) -> ReceiptId {
        ReceiptId(self.receipt_id)
    }

    pub fn webhook_type(&self) -> Option<WebhookType> {
        self.body.as_ref().map(|b| b.type_webhook)
    }
}

fn lenient_body<'de, D>(deserializer: D) -> std::result::Result<Option<NotificationBody>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(None);
    }
    match serde_json::from_value::<NotificationBody>(raw) {
        Ok(body) => Ok(Some(body)),
        Err(e) => {
            warn!("notification body does not decode, acknowledging it unread: {e}");
            Ok(None)
        }
    }
}

/// `null` and missing strings both read as empty.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBody {
    pub type_webhook: WebhookType,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub id_message: Option<String>,
    #[serde(default)]
    pub message_data: Option<MessageData>,
    #[serde(default)]
    pub sender_data: Option<SenderData>,
}

impl NotificationBody {
    pub fn chat_id(&self) -> Option<&str> {
        self.sender_data.as_ref().map(|s| s.chat_id.as_str())
    }

    /// Plain text first, then extended (link preview / quoted) text.
    pub fn text(&self) -> Option<&str> {
        let data = self.message_data.as_ref()?;
        data.text_message_data
            .as_ref()
            .map(|t| t.text_message.as_str())
            .filter(|t| !t.is_empty())
            .or_else(|| {
                data.extended_text_message_data
                    .as_ref()
                    .map(|t| t.text.as_str())
                    .filter(|t| !t.is_empty())
            })
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WebhookType {
    IncomingMessageReceived,
    OutgoingMessageReceived,
    #[serde(rename = "outgoingAPIMessageReceived")]
    OutgoingApiMessageReceived,
    OutgoingMessageStatus,
    StateInstanceChanged,
    #[serde(other)]
    Other,
}

impl WebhookType {
    /// Message notifications shown in the chat view.
    pub fn is_chat_message(self) -> bool {
        matches!(
            self,
            WebhookType::IncomingMessageReceived | WebhookType::OutgoingMessageReceived
        )
    }

    pub fn is_outgoing(self) -> bool {
        matches!(self, WebhookType::OutgoingMessageReceived)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    #[serde(default)]
    pub type_message: Option<String>,
    #[serde(default)]
    pub text_message_data: Option<TextMessageData>,
    #[serde(default)]
    pub extended_text_message_data: Option<ExtendedText>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text_message: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ExtendedText {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SenderData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub chat_id: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
}

/// `deleteNotification` answers either a bare boolean or `{ "result": bool }`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DeleteAck {
    Bare(bool),
    Wrapped { result: bool },
}

impl DeleteAck {
    pub fn accepted(self) -> bool {
        match self {
            DeleteAck::Bare(v) | DeleteAck::Wrapped { result: v } => v,
        }
    }
}

// ============== Chat history ==============

/// One `getChatHistory` record. Every field is optional on the wire.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryRecord {
    /// Direction tag: `incoming` or `outgoing`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id_message: Option<String>,
    pub timestamp: Option<i64>,
    pub type_message: Option<String>,
    pub chat_id: Option<String>,
    pub text_message: Option<String>,
    pub extended_text_message: Option<ExtendedText>,
    pub message_data: Option<MessageData>,
}

impl HistoryRecord {
    pub fn is_outgoing(&self) -> bool {
        self.kind.as_deref() == Some("outgoing")
    }

    /// First non-empty text in priority order: plain, extended, nested.
    pub fn text(&self) -> Option<&str> {
        let plain = self.text_message.as_deref();
        let extended = self.extended_text_message.as_ref().map(|e| e.text.as_str());
        let nested = self
            .message_data
            .as_ref()
            .and_then(|d| d.text_message_data.as_ref())
            .map(|t| t.text_message.as_str());

        [plain, extended, nested]
            .into_iter()
            .flatten()
            .find(|t| !t.is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryPayload {
    Bare(Vec<serde_json::Value>),
    Wrapped { data: Vec<serde_json::Value> },
}

/// Decode a `getChatHistory` payload.
///
/// Accepts a bare array or an object wrapping the array in `data`. Any other
/// shape is logged and treated as an empty history. Records that fail to
/// decode individually are skipped.
pub fn decode_history(raw: serde_json::Value) -> Vec<HistoryRecord> {
    let items = match serde_json::from_value::<HistoryPayload>(raw) {
        Ok(HistoryPayload::Bare(items)) | Ok(HistoryPayload::Wrapped { data: items }) => items,
        Err(e) => {
            warn!("unexpected chat history response shape, treating as empty: {e}");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<HistoryRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("skipping undecodable history record: {e}");
                None
            }
        })
        .collect()
}

// ============== Instance ==============

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InstanceState {
    Authorized,
    NotAuthorized,
    Blocked,
    SleepMode,
    Starting,
    YellowCard,
    #[serde(other)]
    Unknown,
}

impl InstanceState {
    pub fn is_authorized(self) -> bool {
        self == InstanceState::Authorized
    }
}

/// `getStateInstance` response.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StateInstanceResponse {
    pub state_instance: InstanceState,
}

/// `checkWhatsapp` response.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckWhatsappResponse {
    pub exists_whatsapp: bool,
}

/// Subset of `getSettings` this client depends on.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSettings {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(deserialize_with = "flag")]
    pub incoming_webhook: bool,
}

impl InstanceSettings {
    /// A push webhook is configured; polling would race with it.
    pub fn webhook_configured(&self) -> bool {
        self.webhook_url
            .as_deref()
            .map(|u| !u.trim().is_empty())
            .unwrap_or(false)
    }
}

/// The gateway reports switches as `"yes"`/`"no"`; older payloads used booleans.
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(v) => v,
        Flag::Text(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "yes" | "true" | "on" | "1"
        ),
    })
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub chat_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
}

impl ContactInfo {
    /// Address-book name, then profile name, then the raw chat id.
    pub fn display_name(&self) -> &str {
        self.contact_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| Some(self.name.as_str()).filter(|n| !n.trim().is_empty()))
            .unwrap_or(&self.chat_id)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
}

impl ChatSummary {
    pub fn is_chat(&self, chat_id: &ChatId) -> bool {
        self.id == chat_id.0
    }
}
