//! In-memory mailbox, for tests and same-process embedding.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use dd_proto::Envelope;

use crate::error::TransportError;
use crate::transport::MailboxTransport;

#[derive(Default)]
pub struct MemoryMailbox {
    inner: Mutex<HashMap<String, Vec<Envelope>>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of envelopes currently pending for `recipient_id`.
    pub fn pending(&self, recipient_id: &str) -> usize {
        self.inner
            .lock()
            .get(recipient_id)
            .map(|queue| queue.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MailboxTransport for MemoryMailbox {
    async fn append(
        &self,
        recipient_id: &str,
        envelope: &Envelope,
    ) -> Result<(), TransportError> {
        self.inner
            .lock()
            .entry(recipient_id.to_string())
            .or_default()
            .push(envelope.clone());
        Ok(())
    }

    async fn drain_and_clear(&self, recipient_id: &str) -> Result<Vec<Envelope>, TransportError> {
        Ok(self
            .inner
            .lock()
            .remove(recipient_id)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_proto::ENVELOPE_VERSION;

    fn envelope(n: u8) -> Envelope {
        Envelope {
            version: ENVELOPE_VERSION,
            sender_id: "alice".into(),
            recipient_id: "bob".into(),
            wrapped_key: format!("key-{n}"),
            iv: format!("iv-{n}"),
            ciphertext: format!("ct-{n}"),
            sent_at_ms: n as i64,
        }
    }

    #[tokio::test]
    async fn drain_returns_in_arrival_order_and_clears() {
        let mailbox = MemoryMailbox::new();
        mailbox.append("bob", &envelope(1)).await.unwrap();
        mailbox.append("bob", &envelope(2)).await.unwrap();
        mailbox.append("bob", &envelope(3)).await.unwrap();

        let drained = mailbox.drain_and_clear("bob").await.unwrap();
        assert_eq!(
            drained.iter().map(|e| e.sent_at_ms).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(mailbox.drain_and_clear("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_mailbox_drains_empty_not_error() {
        let mailbox = MemoryMailbox::new();
        assert!(mailbox.drain_and_clear("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mailboxes_are_isolated_per_recipient() {
        let mailbox = MemoryMailbox::new();
        mailbox.append("bob", &envelope(1)).await.unwrap();
        mailbox.append("carol", &envelope(2)).await.unwrap();

        assert_eq!(mailbox.drain_and_clear("bob").await.unwrap().len(), 1);
        assert_eq!(mailbox.pending("carol"), 1);
    }
}
