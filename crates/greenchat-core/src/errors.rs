/// Core error type for the chat client.
///
/// Adapter crates map their specific failures into this type so the front end
/// can decide between aborting the chat view, resetting the login flow, or
/// showing an inline message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or HTTP failure talking to the gateway.
    #[error("transport error: {0}")]
    Transport(String),

    /// The instance is not authorized, or the credentials were rejected.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Instance settings are incompatible with queue polling.
    #[error("instance configuration error: {0}")]
    Configuration(String),

    /// Input rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("number {0} is not registered on WhatsApp")]
    NotOnWhatsApp(String),

    /// A gateway response lacked a required field.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Text shown to the user by the front end.
    pub fn user_message(&self) -> String {
        match self {
            Error::Transport(_) => "Could not reach the gateway. Check your connection and try again.".to_string(),
            Error::Authorization(_) => {
                "Instance is not authorized. Scan the QR code in the GREEN-API console and log in again."
                    .to_string()
            }
            Error::Configuration(msg) => msg.clone(),
            Error::Validation(msg) => msg.clone(),
            Error::NotOnWhatsApp(_) => "This number is not linked to WhatsApp.".to_string(),
            Error::Decode(_) => {
                "The gateway sent a response this client does not understand.".to_string()
            }
            Error::Config(msg) => format!("Invalid configuration: {msg}"),
            Error::Io(e) => format!("I/O failure: {e}"),
        }
    }

    /// Whether this failure should send the user back to the credential step.
    pub fn clears_credentials(&self) -> bool {
        matches!(self, Error::Authorization(_))
    }
}
