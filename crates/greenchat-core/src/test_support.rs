//! Scriptable in-memory gateway shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::{
    domain::{ChatId, Credentials, PhoneNumber, ReceiptId, Session},
    errors::Error,
    gateway::{
        types::{
            ChatSummary, ContactInfo, HistoryRecord, InstanceSettings, InstanceState,
            RawNotification, SentMessage,
        },
        Gateway,
    },
    Result,
};

pub struct FakeGateway {
    pub queue: Mutex<VecDeque<RawNotification>>,
    pub state: Mutex<InstanceState>,
    pub settings: Mutex<InstanceSettings>,
    pub history: Mutex<Vec<HistoryRecord>>,
    pub chats: Mutex<Vec<ChatSummary>>,
    pub registered: AtomicBool,
    pub delete_accepted: AtomicBool,
    pub fail_receive: AtomicBool,
    pub fail_send: AtomicBool,
    pub fail_state: AtomicBool,
    /// Number of upcoming deletes that fail with a transport error.
    pub failing_deletes: AtomicUsize,

    pub receive_calls: AtomicUsize,
    pub deleted: Mutex<Vec<ReceiptId>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub history_requests: Mutex<Vec<(String, usize)>>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            state: Mutex::new(InstanceState::Authorized),
            settings: Mutex::new(InstanceSettings {
                webhook_url: Some(String::new()),
                incoming_webhook: true,
            }),
            history: Mutex::new(Vec::new()),
            chats: Mutex::new(Vec::new()),
            registered: AtomicBool::new(true),
            delete_accepted: AtomicBool::new(true),
            fail_receive: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            fail_state: AtomicBool::new(false),
            failing_deletes: AtomicUsize::new(0),
            receive_calls: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            history_requests: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeGateway {
    pub fn push(&self, n: RawNotification) {
        self.queue.lock().unwrap().push_back(n);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<ReceiptId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn send_message(
        &self,
        _creds: &Credentials,
        chat_id: &ChatId,
        text: &str,
    ) -> Result<SentMessage> {
        self.record("sendMessage");
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.0.clone(), text.to_string()));
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection reset".to_string()));
        }
        Ok(SentMessage {
            id_message: "BAE5F4886AD1".to_string(),
        })
    }

    async fn receive_notification(&self, _creds: &Credentials) -> Result<Option<RawNotification>> {
        self.record("receiveNotification");
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_receive.load(Ordering::SeqCst) {
            return Err(Error::Transport("503 Service Unavailable".to_string()));
        }
        // The real queue keeps returning the head until it is deleted.
        Ok(self.queue.lock().unwrap().front().cloned())
    }

    async fn delete_notification(&self, _creds: &Credentials, receipt: ReceiptId) -> Result<bool> {
        self.record("deleteNotification");
        self.deleted.lock().unwrap().push(receipt);
        let failing = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Transport("connection reset".to_string()));
        }
        if !self.delete_accepted.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let mut q = self.queue.lock().unwrap();
        if q.front().map(|n| n.receipt() == receipt).unwrap_or(false) {
            q.pop_front();
        }
        Ok(true)
    }

    async fn chat_history(
        &self,
        _creds: &Credentials,
        chat_id: &ChatId,
        count: usize,
    ) -> Result<Vec<HistoryRecord>> {
        self.record("getChatHistory");
        self.history_requests
            .lock()
            .unwrap()
            .push((chat_id.0.clone(), count));
        let all = self.history.lock().unwrap().clone();
        Ok(all.into_iter().take(count).collect())
    }

    async fn contact_info(&self, _creds: &Credentials, chat_id: &ChatId) -> Result<ContactInfo> {
        self.record("getContactInfo");
        Ok(ContactInfo {
            chat_id: chat_id.0.clone(),
            name: "Test Contact".to_string(),
            contact_name: None,
        })
    }

    async fn instance_state(&self, _creds: &Credentials) -> Result<InstanceState> {
        self.record("getStateInstance");
        if self.fail_state.load(Ordering::SeqCst) {
            return Err(Error::Transport("dns failure".to_string()));
        }
        Ok(*self.state.lock().unwrap())
    }

    async fn check_whatsapp(&self, _creds: &Credentials, _phone: &PhoneNumber) -> Result<bool> {
        self.record("checkWhatsapp");
        Ok(self.registered.load(Ordering::SeqCst))
    }

    async fn settings(&self, _creds: &Credentials) -> Result<InstanceSettings> {
        self.record("getSettings");
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn chats(&self, _creds: &Credentials) -> Result<Vec<ChatSummary>> {
        self.record("getChats");
        Ok(self.chats.lock().unwrap().clone())
    }
}

pub fn creds() -> Credentials {
    Credentials::new("111", "abc").unwrap()
}

pub fn session() -> Session {
    Session::new(creds(), PhoneNumber::parse("15551234567").unwrap())
}

pub fn text_notification(
    receipt: i64,
    webhook: &str,
    chat_id: &str,
    text: &str,
    timestamp: i64,
) -> RawNotification {
    serde_json::from_value(json!({
        "receiptId": receipt,
        "body": {
            "typeWebhook": webhook,
            "timestamp": timestamp,
            "idMessage": format!("MSG{receipt}"),
            "messageData": {
                "typeMessage": "textMessage",
                "textMessageData": { "textMessage": text }
            },
            "senderData": { "chatId": chat_id }
        }
    }))
    .unwrap()
}

/// A queue entry whose body fails to decode (string timestamp).
pub fn malformed_notification(receipt: i64) -> RawNotification {
    serde_json::from_value(json!({
        "receiptId": receipt,
        "body": {
            "typeWebhook": "incomingMessageReceived",
            "timestamp": "soon",
            "senderData": { "chatId": "15551234567@c.us" },
            "messageData": { "textMessageData": { "textMessage": "lost" } }
        }
    }))
    .unwrap()
}

pub fn history_record(value: serde_json::Value) -> HistoryRecord {
    serde_json::from_value(value).unwrap()
}
