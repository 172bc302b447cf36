//! The `Messenger` facade: the control surface a UI layer drives.
//!
//! Send path runs on the caller's task; the receive path is one
//! delivery poller per identity, started by `start_listening` and
//! stopped by `stop_listening` (or by dropping the event receiver).
//! Starting a second listener while one is live is rejected so the
//! mailbox can never be double-drained.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

use dd_proto::Envelope;
use dd_store::{Contact, Identity, IdentityStore};

use crate::error::ChannelError;
use crate::events::ChannelEvent;
use crate::poller::{spawn_delivery_poller, PollerHandle};
use crate::transport::MailboxTransport;

/// Default poll cadence. Liveness/latency trade-off only; correctness
/// does not depend on it.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const EVENT_BUFFER: usize = 64;

struct Listener {
    handle: PollerHandle,
    task: JoinHandle<()>,
}

pub struct Messenger {
    store: Arc<IdentityStore>,
    transport: Arc<dyn MailboxTransport>,
    poll_interval: Duration,
    listener: Mutex<Option<Listener>>,
}

impl Messenger {
    pub fn new(store: Arc<IdentityStore>, transport: Arc<dyn MailboxTransport>) -> Self {
        Self {
            store,
            transport,
            poll_interval: DEFAULT_POLL_INTERVAL,
            listener: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    // ── Identity & contacts ──────────────────────────────────────────────────

    /// Load-or-create the device identity. Idempotent.
    pub fn ensure_identity(&self) -> Result<Identity, ChannelError> {
        Ok(self.store.ensure_identity()?)
    }

    /// Register a contact. The returned contact carries the freshly
    /// generated conversation public key; hand it to the peer
    /// out-of-band or their messages to us will never decrypt.
    pub fn add_contact(
        &self,
        contact_id: &str,
        remote_public_key_b64: &str,
    ) -> Result<Contact, ChannelError> {
        Ok(self.store.add_contact(contact_id, remote_public_key_b64)?)
    }

    pub fn contact_ids(&self) -> Vec<String> {
        self.store.contact_ids()
    }

    /// The conversation public key for a contact, for (re-)sharing with
    /// the peer out-of-band.
    pub fn conversation_public_key(&self, contact_id: &str) -> Result<String, ChannelError> {
        self.store
            .contact(contact_id)
            .map(|c| c.conversation_public_b64())
            .ok_or_else(|| ChannelError::UnknownRecipient(contact_id.to_string()))
    }

    // ── Send path ────────────────────────────────────────────────────────────

    /// Seal `plaintext` for a known contact and append it to their
    /// mailbox. Transport failures surface to the caller; the core does
    /// not retry.
    pub async fn send_message(
        &self,
        recipient_id: &str,
        plaintext: &str,
    ) -> Result<Envelope, ChannelError> {
        let identity = self.store.identity().ok_or(ChannelError::NoIdentity)?;
        let contact = self
            .store
            .contact(recipient_id)
            .ok_or_else(|| ChannelError::UnknownRecipient(recipient_id.to_string()))?;

        let envelope = dd_proto::seal(
            plaintext,
            &identity.user_id,
            recipient_id,
            &contact.remote_public_key,
        )?;
        self.transport.append(recipient_id, &envelope).await?;
        Ok(envelope)
    }

    // ── Receive path ─────────────────────────────────────────────────────────

    /// Start the delivery poller and return its event stream. The
    /// stream starts fresh: no buffered history. Fails with
    /// `AlreadyListening` while a previous poller is live.
    pub async fn start_listening(&self) -> Result<mpsc::Receiver<ChannelEvent>, ChannelError> {
        let identity = self.store.identity().ok_or(ChannelError::NoIdentity)?;

        let mut guard = self.listener.lock().await;
        if let Some(ref listener) = *guard {
            if !listener.task.is_finished() {
                return Err(ChannelError::AlreadyListening);
            }
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (task, handle) = spawn_delivery_poller(
            identity.user_id,
            self.store.clone(),
            self.transport.clone(),
            self.poll_interval,
            events_tx,
        );
        *guard = Some(Listener { handle, task });
        Ok(events_rx)
    }

    /// Poll immediately instead of waiting out the interval.
    pub async fn poll_now(&self) -> Result<(), ChannelError> {
        let guard = self.listener.lock().await;
        match *guard {
            Some(ref listener) => {
                listener.handle.wake.notify_one();
                Ok(())
            }
            None => Err(ChannelError::NotListening),
        }
    }

    /// Stop the poller at its next suspension point and wait for it to
    /// finish. In-flight batch processing completes first.
    pub async fn stop_listening(&self) -> Result<(), ChannelError> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or(ChannelError::NotListening)?;
        listener.handle.shutdown();
        if let Err(e) = listener.task.await {
            warn!(error = %e, "delivery poller task join failed");
        }
        Ok(())
    }
}
