//! Live notification polling for an open chat.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    domain::{ChatId, Credentials, MessageKey},
    events::{ChatEvent, PollEvent},
    gateway::{types::RawNotification, Gateway},
    transcript::{now_seconds, DisplayMessage, KeyGenerator},
    Result,
};

/// Default spacing between poll ticks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Turn a notification into a message for `chat_id`, or `None` if it is not
/// a text message in that chat.
pub fn classify(
    notification: &RawNotification,
    chat_id: &ChatId,
    keys: &KeyGenerator,
) -> Option<DisplayMessage> {
    let body = notification.body.as_ref()?;
    if !body.type_webhook.is_chat_message() {
        return None;
    }
    if body.chat_id() != Some(chat_id.as_str()) {
        return None;
    }
    let text = body.text()?;

    let timestamp = if body.timestamp != 0 {
        body.timestamp
    } else {
        now_seconds()
    };
    let id = body
        .id_message
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| MessageKey(id.to_string()))
        .unwrap_or_else(|| keys.mint(timestamp));

    Some(DisplayMessage {
        id,
        text: text.to_string(),
        is_outgoing: body.type_webhook.is_outgoing(),
        timestamp,
    })
}

/// One poll tick: fetch at most one notification, classify it, acknowledge it.
///
/// The notification is deleted whether or not it belongs to the active chat,
/// otherwise unrelated traffic would pile up in the queue.
pub async fn poll_once(
    gateway: &dyn Gateway,
    creds: &Credentials,
    chat_id: &ChatId,
    keys: &KeyGenerator,
) -> Result<PollEvent> {
    let Some(notification) = gateway.receive_notification(creds).await? else {
        return Ok(PollEvent::Empty);
    };
    let receipt = notification.receipt();
    let message = classify(&notification, chat_id, keys);

    match gateway.delete_notification(creds, receipt).await {
        Ok(true) => {}
        Ok(false) => warn!("gateway did not confirm deletion of notification {receipt}"),
        Err(e) if message.is_some() => {
            warn!("failed to acknowledge notification {receipt}: {e}");
        }
        Err(e) => return Err(e),
    }

    Ok(match message {
        Some(msg) => PollEvent::Message(msg),
        None => {
            debug!(
                "acknowledged notification {receipt} ({:?}) outside the active chat",
                notification.webhook_type()
            );
            PollEvent::Ignored { receipt }
        }
    })
}

/// Handle to the background poll task.
pub struct Poller {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling. The first tick fires one `period` after start.
    pub fn spawn(
        gateway: Arc<dyn Gateway>,
        creds: Credentials,
        chat_id: ChatId,
        period: Duration,
        keys: Arc<KeyGenerator>,
        events: mpsc::UnboundedSender<ChatEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                  _ = token.cancelled() => break,
                  _ = tick.tick() => {
                    let event = match poll_once(gateway.as_ref(), &creds, &chat_id, &keys).await {
                      Ok(ev) => ev,
                      Err(e) => {
                        warn!("poll tick failed: {e}");
                        PollEvent::Failed(e.to_string())
                      }
                    };
                    if events.send(ChatEvent::Poll(event)).is_err() {
                      break;
                    }
                  }
                }
            }
            debug!("poller for {chat_id} stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the timer and wait for an in-flight tick to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReceiptId;
    use crate::test_support::{creds, malformed_notification, text_notification, FakeGateway};
    use crate::transcript::{Transcript, TranscriptUpdate};
    use std::sync::atomic::Ordering;

    const CHAT: &str = "15551234567@c.us";

    fn chat() -> ChatId {
        ChatId(CHAT.to_string())
    }

    #[tokio::test]
    async fn empty_queue_yields_empty_event() {
        let gw = FakeGateway::default();
        let ev = poll_once(&gw, &creds(), &chat(), &KeyGenerator::new()).await.unwrap();
        assert_eq!(ev, PollEvent::Empty);
        assert!(gw.deleted().is_empty());
    }

    #[tokio::test]
    async fn incoming_message_for_active_chat_is_rendered_and_acked() {
        let gw = FakeGateway::default();
        gw.push(text_notification(5, "incomingMessageReceived", CHAT, "hey", 1_700_000_000));

        let ev = poll_once(&gw, &creds(), &chat(), &KeyGenerator::new()).await.unwrap();
        let PollEvent::Message(msg) = &ev else {
            panic!("expected a message, got {ev:?}");
        };
        assert_eq!(msg.text, "hey");
        assert!(!msg.is_outgoing);
        assert_eq!(msg.timestamp, 1_700_000_000);
        assert_eq!(msg.id, MessageKey("MSG5".into()));
        assert_eq!(gw.deleted(), vec![ReceiptId(5)]);
    }

    #[tokio::test]
    async fn outgoing_from_phone_is_marked_outgoing() {
        let gw = FakeGateway::default();
        gw.push(text_notification(6, "outgoingMessageReceived", CHAT, "sent from phone", 10));
        let ev = poll_once(&gw, &creds(), &chat(), &KeyGenerator::new()).await.unwrap();
        assert!(matches!(ev, PollEvent::Message(ref m) if m.is_outgoing));
    }

    #[tokio::test]
    async fn other_chat_is_acked_but_not_rendered() {
        let gw = FakeGateway::default();
        gw.push(text_notification(7, "incomingMessageReceived", "19998887766@c.us", "spam", 10));

        let ev = poll_once(&gw, &creds(), &chat(), &KeyGenerator::new()).await.unwrap();
        assert_eq!(ev, PollEvent::Ignored { receipt: ReceiptId(7) });
        assert_eq!(gw.deleted(), vec![ReceiptId(7)]);
    }

    #[tokio::test]
    async fn status_notifications_are_acked_but_not_rendered() {
        let gw = FakeGateway::default();
        gw.push(text_notification(8, "outgoingMessageStatus", CHAT, "", 10));
        let ev = poll_once(&gw, &creds(), &chat(), &KeyGenerator::new()).await.unwrap();
        assert_eq!(ev, PollEvent::Ignored { receipt: ReceiptId(8) });
        assert_eq!(gw.deleted(), vec![ReceiptId(8)]);
    }

    #[tokio::test]
    async fn takes_only_one_notification_per_tick() {
        let gw = FakeGateway::default();
        gw.push(text_notification(1, "incomingMessageReceived", CHAT, "one", 10));
        gw.push(text_notification(2, "incomingMessageReceived", CHAT, "two", 11));

        poll_once(&gw, &creds(), &chat(), &KeyGenerator::new()).await.unwrap();
        assert_eq!(gw.receive_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gw.queue.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_ack_redelivery_is_shown_once() {
        let gw = FakeGateway::default();
        gw.failing_deletes.store(1, Ordering::SeqCst);
        gw.push(text_notification(5, "incomingMessageReceived", CHAT, "twice?", 10));
        let keys = KeyGenerator::new();
        let mut transcript = Transcript::new();

        for _ in 0..2 {
            let ev = poll_once(&gw, &creds(), &chat(), &keys).await.unwrap();
            let PollEvent::Message(msg) = ev else {
                panic!("expected the message to be delivered");
            };
            transcript.apply(TranscriptUpdate::Append(msg));
        }

        assert_eq!(gw.deleted(), vec![ReceiptId(5), ReceiptId(5)]);
        assert!(gw.queue.lock().unwrap().is_empty());
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].id, MessageKey("MSG5".into()));
    }

    #[tokio::test]
    async fn malformed_notification_is_acked_and_ignored() {
        let gw = FakeGateway::default();
        gw.push(malformed_notification(9));

        let ev = poll_once(&gw, &creds(), &chat(), &KeyGenerator::new()).await.unwrap();
        assert_eq!(ev, PollEvent::Ignored { receipt: ReceiptId(9) });
        assert_eq!(gw.deleted(), vec![ReceiptId(9)]);
        assert!(gw.queue.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_timestamp_falls_back_to_now() {
        let n = text_notification(1, "incomingMessageReceived", CHAT, "x", 0);
        let msg = classify(&n, &chat(), &KeyGenerator::new()).unwrap();
        assert!(msg.timestamp > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_failed_ticks_and_stops_on_cancel() {
        let gw = Arc::new(FakeGateway::default());
        gw.fail_receive.store(true, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let poller = Poller::spawn(
            gw.clone(),
            creds(),
            chat(),
            POLL_INTERVAL,
            Arc::new(KeyGenerator::new()),
            tx,
        );

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, ChatEvent::Poll(PollEvent::Failed(_))));

        gw.fail_receive.store(false, Ordering::SeqCst);
        gw.push(text_notification(3, "incomingMessageReceived", CHAT, "back online", 10));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second, ChatEvent::Poll(PollEvent::Message(ref m)) if m.text == "back online"));
        assert!(poller.is_running());

        poller.stop().await;
        let calls = gw.receive_calls.load(Ordering::SeqCst);
        tokio::time::sleep(POLL_INTERVAL * 3).await;
        assert_eq!(gw.receive_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let gw = Arc::new(FakeGateway::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let poller = Poller::spawn(
            gw.clone(),
            creds(),
            chat(),
            POLL_INTERVAL,
            Arc::new(KeyGenerator::new()),
            tx,
        );

        tokio::time::sleep(POLL_INTERVAL - Duration::from_millis(1)).await;
        assert_eq!(gw.receive_calls.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(gw.receive_calls.load(Ordering::SeqCst), 1);

        poller.stop().await;
    }
}
