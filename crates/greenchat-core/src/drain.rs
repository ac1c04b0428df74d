//! Queue drain run before a chat view opens.
//!
//! Backlog left in the notification queue would otherwise be rendered as live
//! traffic by the poller.

use tracing::{debug, info};

use crate::{domain::Credentials, errors::Error, gateway::Gateway, Result};

/// Fetch and delete notifications until the queue reports empty.
///
/// Returns how many notifications were discarded. A transport failure, or a
/// delete the gateway refuses, aborts the drain.
pub async fn drain_queue(gateway: &dyn Gateway, creds: &Credentials) -> Result<usize> {
    let mut drained = 0usize;

    while let Some(notification) = gateway.receive_notification(creds).await? {
        let receipt = notification.receipt();
        debug!(
            "draining stale notification {receipt} ({:?})",
            notification.webhook_type()
        );

        if !gateway.delete_notification(creds, receipt).await? {
            return Err(Error::Transport(format!(
                "gateway refused to delete notification {receipt}"
            )));
        }
        drained += 1;
    }

    if drained > 0 {
        info!("drained {drained} stale notifications");
    }
    Ok(drained)
}
