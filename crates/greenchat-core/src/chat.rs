//! Chat view: brings an instance from "logged in" to "live chat".
//!
//! Opening runs the state and settings checks, drains stale notifications,
//! loads history and then starts the poller. Every transcript change goes
//! through one event channel into a single apply task, which publishes
//! snapshots over a `watch` channel.

use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    domain::{ChatId, MessageKey, Session},
    drain::drain_queue,
    errors::Error,
    events::{ChatEvent, PollEvent},
    gateway::{
        types::{ContactInfo, InstanceSettings},
        Gateway,
    },
    history::{load_history, unread_history, HISTORY_WINDOW},
    poller::{Poller, POLL_INTERVAL},
    send::send_text,
    transcript::{KeyGenerator, Transcript, TranscriptUpdate},
    Result,
};

pub const WEBHOOK_URL_SET: &str = "Disable the webhook URL in the instance settings";
pub const INCOMING_WEBHOOK_OFF: &str =
    "Enable incoming message notifications in the instance settings";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChatOptions {
    pub poll_interval: Duration,
    pub history_count: usize,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            history_count: HISTORY_WINDOW,
        }
    }
}

/// Reject settings under which queue polling cannot see incoming messages.
pub fn check_settings(settings: &InstanceSettings) -> Result<()> {
    if settings.webhook_configured() {
        return Err(Error::Configuration(WEBHOOK_URL_SET.to_string()));
    }
    if !settings.incoming_webhook {
        return Err(Error::Configuration(INCOMING_WEBHOOK_OFF.to_string()));
    }
    Ok(())
}

/// Cloneable handle for sending into an open chat.
///
/// Sends spawned from a front end keep working while the view is rendering;
/// once the view is closed their transcript updates are dropped.
#[derive(Clone)]
pub struct Composer {
    gateway: Arc<dyn Gateway>,
    session: Session,
    chat_id: ChatId,
    keys: Arc<KeyGenerator>,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl Composer {
    pub async fn send(&self, text: &str) -> Result<MessageKey> {
        send_text(
            self.gateway.as_ref(),
            &self.session.credentials,
            &self.chat_id,
            text,
            &self.keys,
            &self.events,
        )
        .await
    }
}

pub struct ChatView {
    composer: Composer,
    snapshots: watch::Receiver<Transcript>,
    poller: Option<Poller>,
    applier: Option<JoinHandle<()>>,
}

impl ChatView {
    pub async fn open(
        gateway: Arc<dyn Gateway>,
        session: Session,
        options: ChatOptions,
    ) -> Result<Self> {
        let creds = &session.credentials;
        let chat_id = session.chat_id();

        let state = gateway.instance_state(creds).await?;
        if !state.is_authorized() {
            return Err(Error::Authorization(format!(
                "instance {} is {state:?}",
                creds.instance_id()
            )));
        }

        check_settings(&gateway.settings(creds).await?)?;

        drain_queue(gateway.as_ref(), creds).await?;

        let keys = Arc::new(KeyGenerator::new());
        let history = load_history(
            gateway.as_ref(),
            creds,
            &chat_id,
            options.history_count,
            &keys,
        )
        .await?;

        let (events, rx) = mpsc::unbounded_channel();
        let (snap_tx, snapshots) = watch::channel(Transcript::new());
        let _ = events.send(ChatEvent::Transcript(TranscriptUpdate::MergeHistory(history)));
        let applier = tokio::spawn(apply_loop(rx, snap_tx));

        let poller = Poller::spawn(
            gateway.clone(),
            creds.clone(),
            chat_id.clone(),
            options.poll_interval,
            keys.clone(),
            events.clone(),
        );

        info!("chat with {chat_id} open");

        Ok(Self {
            composer: Composer {
                gateway,
                session,
                chat_id,
                keys,
                events,
            },
            snapshots,
            poller: Some(poller),
            applier: Some(applier),
        })
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.composer.chat_id
    }

    pub fn session(&self) -> &Session {
        &self.composer.session
    }

    pub fn composer(&self) -> Composer {
        self.composer.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Transcript> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> Transcript {
        self.snapshots.borrow().clone()
    }

    pub async fn send(&self, text: &str) -> Result<MessageKey> {
        self.composer.send(text).await
    }

    /// Merge the chat's unread tail into the transcript. Returns how many
    /// messages were fetched; already shown ones are not duplicated.
    pub async fn load_unread(&self) -> Result<usize> {
        let c = &self.composer;
        let unread =
            unread_history(c.gateway.as_ref(), &c.session.credentials, &c.chat_id, &c.keys).await?;
        let n = unread.len();
        let _ = c
            .events
            .send(ChatEvent::Transcript(TranscriptUpdate::MergeHistory(unread)));
        Ok(n)
    }

    pub async fn contact(&self) -> Result<ContactInfo> {
        let c = &self.composer;
        c.gateway.contact_info(&c.session.credentials, &c.chat_id).await
    }

    /// Stop polling, then the apply task. Composers still alive after this
    /// send into a closed channel and their updates are dropped.
    pub async fn close(mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
        let Some(applier) = self.applier.take() else {
            return;
        };
        // Outstanding composers hold sender clones, so the apply task is
        // aborted rather than waited for.
        applier.abort();
        let _ = applier.await;
        debug!("chat with {} closed", self.composer.chat_id);
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        if let Some(applier) = self.applier.take() {
            applier.abort();
        }
    }
}

async fn apply_loop(mut rx: mpsc::UnboundedReceiver<ChatEvent>, snapshots: watch::Sender<Transcript>) {
    while let Some(event) = rx.recv().await {
        if let ChatEvent::Poll(PollEvent::Failed(reason)) = &event {
            warn!("live updates degraded: {reason}");
        }
        if let Some(update) = event.into_update() {
            snapshots.send_modify(|t| t.apply(update));
        }
    }
}
