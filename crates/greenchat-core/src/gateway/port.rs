use async_trait::async_trait;

use crate::{
    domain::{ChatId, Credentials, PhoneNumber, ReceiptId},
    gateway::types::{
        ChatSummary, ContactInfo, HistoryRecord, InstanceSettings, InstanceState,
        RawNotification, SentMessage,
    },
    Result,
};

/// Port for the WhatsApp gateway.
///
/// Credentials are passed into every call instead of living in shared state, so
/// a call without a logged-in instance cannot be expressed.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send_message(
        &self,
        creds: &Credentials,
        chat_id: &ChatId,
        text: &str,
    ) -> Result<SentMessage>;

    /// Next queued notification, or `None` when the queue is empty.
    async fn receive_notification(&self, creds: &Credentials) -> Result<Option<RawNotification>>;

    async fn delete_notification(&self, creds: &Credentials, receipt: ReceiptId) -> Result<bool>;

    /// Up to `count` history records. Unrecognized payloads decode to an empty list.
    async fn chat_history(
        &self,
        creds: &Credentials,
        chat_id: &ChatId,
        count: usize,
    ) -> Result<Vec<HistoryRecord>>;

    async fn contact_info(&self, creds: &Credentials, chat_id: &ChatId) -> Result<ContactInfo>;

    async fn instance_state(&self, creds: &Credentials) -> Result<InstanceState>;

    async fn check_whatsapp(&self, creds: &Credentials, phone: &PhoneNumber) -> Result<bool>;

    async fn settings(&self, creds: &Credentials) -> Result<InstanceSettings>;

    async fn chats(&self, creds: &Credentials) -> Result<Vec<ChatSummary>>;
}
