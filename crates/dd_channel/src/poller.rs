//! The delivery poller: a cancellable periodic tokio task.
//!
//! Each iteration drains this identity's mailbox and opens every
//! envelope independently; one bad envelope becomes one DeliveryError
//! event and never blocks or drops its siblings. Cancellation and the
//! manual wake are observed only at the top of an iteration, never in
//! the middle of a batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dd_proto::Envelope;
use dd_store::IdentityStore;

use crate::error::ChannelError;
use crate::events::ChannelEvent;
use crate::transport::MailboxTransport;

/// Handle returned to the caller so it can poll immediately or shut the
/// loop down.
pub struct PollerHandle {
    /// Notify to wake the loop before the interval elapses.
    pub wake: Arc<Notify>,
    shutdown_tx: watch::Sender<bool>,
}

impl PollerHandle {
    /// Request shutdown; the loop exits at its next suspension point.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Open one drained envelope against the contact registry.
pub(crate) fn open_incoming(
    store: &IdentityStore,
    envelope: &Envelope,
) -> Result<String, ChannelError> {
    let contact = store
        .contact(&envelope.sender_id)
        .ok_or_else(|| ChannelError::UnknownSender(envelope.sender_id.clone()))?;
    Ok(dd_proto::open(envelope, &contact.conversation_keypair)?)
}

/// Spawn the delivery loop for `user_id`. Returns the task handle and a
/// control handle. Events go to `events_tx`; when the receiver is
/// dropped the loop winds down on its own.
pub(crate) fn spawn_delivery_poller(
    user_id: String,
    store: Arc<IdentityStore>,
    transport: Arc<dyn MailboxTransport>,
    interval: Duration,
    events_tx: mpsc::Sender<ChannelEvent>,
) -> (JoinHandle<()>, PollerHandle) {
    let wake = Arc::new(Notify::new());
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let wake_clone = wake.clone();

    let task = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "delivery poller started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = wake_clone.notified() => {
                    debug!("delivery poller woken early");
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("delivery poller shutting down");
                        return;
                    }
                }
            }

            // Check shutdown again after wakeup.
            if *shutdown_rx.borrow() {
                return;
            }

            let batch = match transport.drain_and_clear(&user_id).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "mailbox drain failed, retrying next poll");
                    continue;
                }
            };
            if batch.is_empty() {
                continue;
            }
            debug!(count = batch.len(), "drained envelope batch");

            for envelope in batch {
                let event = match open_incoming(&store, &envelope) {
                    Ok(plaintext) => ChannelEvent::MessageReceived {
                        sender_id: envelope.sender_id.clone(),
                        plaintext,
                        sent_at_ms: envelope.sent_at_ms,
                    },
                    Err(e) => ChannelEvent::DeliveryError {
                        reason: e.to_string(),
                        envelope,
                    },
                };
                if events_tx.send(event).await.is_err() {
                    info!("event listener dropped, delivery poller stopping");
                    return;
                }
            }
        }
    });

    (
        task,
        PollerHandle {
            wake,
            shutdown_tx,
        },
    )
}
