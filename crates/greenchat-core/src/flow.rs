//! Login flow: credentials, then phone number, then the chat itself.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    chat::{ChatOptions, ChatView},
    domain::{Credentials, PhoneNumber, Session},
    errors::Error,
    gateway::Gateway,
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Credentials,
    Phone { credentials: Credentials },
    Chat { session: Session },
}

pub struct LoginFlow {
    gateway: Arc<dyn Gateway>,
    stage: Stage,
}

impl LoginFlow {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            stage: Stage::Credentials,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.stage {
            Stage::Chat { session } => Some(session),
            _ => None,
        }
    }

    /// Validate and verify instance credentials.
    ///
    /// Any failure leaves the flow at the credential step with nothing stored.
    pub async fn submit_credentials(&mut self, instance_id: &str, api_token: &str) -> Result<()> {
        self.stage = Stage::Credentials;
        let credentials = Credentials::new(instance_id, api_token)?;

        let state = match self.gateway.instance_state(&credentials).await {
            Ok(state) => state,
            Err(e) => {
                warn!("credential check for instance {} failed: {e}", credentials.instance_id());
                return Err(e);
            }
        };
        if !state.is_authorized() {
            return Err(Error::Authorization(format!(
                "instance {} is {state:?}",
                credentials.instance_id()
            )));
        }

        info!("instance {} authorized", credentials.instance_id());
        self.stage = Stage::Phone { credentials };
        Ok(())
    }

    /// Validate the destination number and confirm it is on WhatsApp.
    pub async fn submit_phone(&mut self, raw: &str) -> Result<()> {
        let credentials = match &self.stage {
            Stage::Phone { credentials } => credentials.clone(),
            Stage::Chat { session } => session.credentials.clone(),
            Stage::Credentials => {
                return Err(Error::Validation("Log in before choosing a number".to_string()))
            }
        };
        let phone = PhoneNumber::parse(raw)?;

        match self.gateway.check_whatsapp(&credentials, &phone).await {
            Ok(true) => {}
            Ok(false) => return Err(Error::NotOnWhatsApp(phone.to_string())),
            Err(e) => return Err(self.fail(e)),
        }

        self.stage = Stage::Chat {
            session: Session::new(credentials, phone),
        };
        Ok(())
    }

    /// Open the chat for the current session.
    pub async fn open_chat(&mut self, options: ChatOptions) -> Result<ChatView> {
        let Stage::Chat { session } = &self.stage else {
            return Err(Error::Validation("Choose a number first".to_string()));
        };
        ChatView::open(self.gateway.clone(), session.clone(), options)
            .await
            .map_err(|e| self.fail(e))
    }

    /// Step back one stage. Leaving the phone step forgets the credentials.
    pub fn back(&mut self) {
        self.stage = match std::mem::replace(&mut self.stage, Stage::Credentials) {
            Stage::Chat { session } => Stage::Phone {
                credentials: session.credentials,
            },
            Stage::Phone { .. } | Stage::Credentials => Stage::Credentials,
        };
    }

    pub fn logout(&mut self) {
        self.stage = Stage::Credentials;
    }

    fn fail(&mut self, e: Error) -> Error {
        if e.clears_credentials() {
            warn!("credentials rejected, returning to login: {e}");
            self.stage = Stage::Credentials;
        }
        e
    }
}
