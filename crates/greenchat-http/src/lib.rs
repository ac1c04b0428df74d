//! GREEN-API adapter for the [`Gateway`] port.
//!
//! Every call goes to `{api_url}/waInstance{id}/{method}/{token}`.

use std::time::Duration;

use async_trait::async_trait;
use greenchat_core::{
    domain::{ChatId, Credentials, PhoneNumber, ReceiptId},
    errors::Error,
    gateway::{
        types::{
            decode_history, ChatSummary, CheckWhatsappResponse, ContactInfo, DeleteAck,
            HistoryRecord, InstanceSettings, InstanceState, RawNotification, SentMessage,
            StateInstanceResponse,
        },
        Gateway,
    },
    Result,
};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatHistoryRequest<'a> {
    chat_id: &'a str,
    count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    chat_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckWhatsappRequest {
    phone_number: u64,
}

#[derive(Clone, Debug)]
pub struct GreenApiClient {
    api_url: String,
    http: reqwest::Client,
}

impl GreenApiClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, creds: &Credentials, method: &str) -> String {
        format!(
            "{}/waInstance{}/{}/{}",
            self.api_url,
            creds.instance_id(),
            method,
            creds.api_token()
        )
    }

    async fn call<B, T>(
        &self,
        verb: Method,
        url: String,
        method: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let mut req = self.http.request(verb, url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{method} request error: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("{method} read error: {e}")))?;

        if !status.is_success() {
            return Err(status_error(method, status, &text));
        }

        debug!("{method} -> {status} ({} bytes)", text.len());
        parse_body(method, &text)
    }

    async fn get<T: DeserializeOwned>(&self, creds: &Credentials, method: &str) -> Result<T> {
        self.call::<(), T>(Method::GET, self.url(creds, method), method, None)
            .await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        creds: &Credentials,
        method: &str,
        body: &B,
    ) -> Result<T> {
        self.call(Method::POST, self.url(creds, method), method, Some(body))
            .await
    }
}

fn status_error(method: &str, status: StatusCode, body: &str) -> Error {
    let snippet = body.chars().take(200).collect::<String>();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Authorization(format!("{method} rejected credentials: {status}"))
        }
        _ => Error::Transport(format!("{method} failed: {status} {snippet}")),
    }
}

/// An empty body decodes as JSON `null`, which `Option` targets accept.
fn parse_body<T: DeserializeOwned>(method: &str, text: &str) -> Result<T> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| Error::Decode(format!("{method} response: {e}")))
}

#[async_trait]
impl Gateway for GreenApiClient {
    async fn send_message(
        &self,
        creds: &Credentials,
        chat_id: &ChatId,
        text: &str,
    ) -> Result<SentMessage> {
        let body = SendMessageRequest {
            chat_id: chat_id.as_str(),
            message: text,
        };
        self.post(creds, "sendMessage", &body).await
    }

    async fn receive_notification(&self, creds: &Credentials) -> Result<Option<RawNotification>> {
        self.get(creds, "receiveNotification").await
    }

    async fn delete_notification(&self, creds: &Credentials, receipt: ReceiptId) -> Result<bool> {
        let url = format!("{}/{}", self.url(creds, "deleteNotification"), receipt);
        let ack: DeleteAck = self
            .call::<(), _>(Method::DELETE, url, "deleteNotification", None)
            .await?;
        Ok(ack.accepted())
    }

    async fn chat_history(
        &self,
        creds: &Credentials,
        chat_id: &ChatId,
        count: usize,
    ) -> Result<Vec<HistoryRecord>> {
        let body = ChatHistoryRequest {
            chat_id: chat_id.as_str(),
            count,
        };
        let raw: serde_json::Value = self.post(creds, "getChatHistory", &body).await?;
        Ok(decode_history(raw))
    }

    async fn contact_info(&self, creds: &Credentials, chat_id: &ChatId) -> Result<ContactInfo> {
        let body = ChatRequest {
            chat_id: chat_id.as_str(),
        };
        self.post(creds, "getContactInfo", &body).await
    }

    async fn instance_state(&self, creds: &Credentials) -> Result<InstanceState> {
        let resp: StateInstanceResponse = self.get(creds, "getStateInstance").await?;
        Ok(resp.state_instance)
    }

    async fn check_whatsapp(&self, creds: &Credentials, phone: &PhoneNumber) -> Result<bool> {
        let phone_number = phone
            .as_str()
            .parse::<u64>()
            .map_err(|e| Error::Validation(format!("phone number out of range: {e}")))?;
        let resp: CheckWhatsappResponse = self
            .post(creds, "checkWhatsapp", &CheckWhatsappRequest { phone_number })
            .await?;
        Ok(resp.exists_whatsapp)
    }

    async fn settings(&self, creds: &Credentials) -> Result<InstanceSettings> {
        self.get(creds, "getSettings").await
    }

    async fn chats(&self, creds: &Credentials) -> Result<Vec<ChatSummary>> {
        self.get(creds, "getChats").await
    }
}
