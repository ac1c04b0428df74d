use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::{errors::Error, Result};

/// Suffix the gateway uses for one-to-one chats.
pub const PERSONAL_CHAT_SUFFIX: &str = "@c.us";

/// Instance credentials. Both fields are non-empty by construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    instance_id: String,
    api_token: String,
}

impl Credentials {
    pub fn new(instance_id: impl AsRef<str>, api_token: impl AsRef<str>) -> Result<Self> {
        let instance_id = instance_id.as_ref().trim();
        let api_token = api_token.as_ref().trim();

        if instance_id.is_empty() {
            return Err(Error::Validation("Instance ID is required".to_string()));
        }
        if api_token.is_empty() {
            return Err(Error::Validation("API token is required".to_string()));
        }

        Ok(Self {
            instance_id: instance_id.to_string(),
            api_token: api_token.to_string(),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn api_token(&self) -> &str {
        &self.api_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("instance_id", &self.instance_id)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Destination phone number: 10 to 15 digits starting with the country code, no formatting.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parse user input. Formatting characters (`+`, spaces, dashes, parens) are dropped.
    pub fn parse(raw: &str) -> Result<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if !phone_pattern().is_match(&digits) {
            return Err(Error::Validation(
                "Phone number must be 10 to 15 digits starting with the country code".to_string(),
            ));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn chat_id(&self) -> ChatId {
        ChatId(format!("{}{PERSONAL_CHAT_SUFFIX}", self.0))
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.0)
    }
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[1-9]\d{9,14}$").expect("valid regex"))
}

/// Gateway chat id (`79001234567@c.us`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notification receipt used for acknowledgment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReceiptId(pub i64);

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of a transcript entry.
///
/// Either the gateway's `idMessage` or a key minted once on the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageKey(pub String);

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated user talking to one phone number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub credentials: Credentials,
    pub phone: PhoneNumber,
}

impl Session {
    pub fn new(credentials: Credentials, phone: PhoneNumber) -> Self {
        Self { credentials, phone }
    }

    pub fn chat_id(&self) -> ChatId {
        self.phone.chat_id()
    }
}
