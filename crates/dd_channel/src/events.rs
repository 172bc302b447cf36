//! Events emitted to the UI layer by the delivery poller.
//!
//! The stream is infinite and not restartable mid-flight: a new
//! listener starts fresh with no buffered history.

use dd_proto::Envelope;

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// An envelope was drained and decrypted successfully.
    MessageReceived {
        sender_id: String,
        plaintext: String,
        sent_at_ms: i64,
    },
    /// An envelope was drained but could not be opened. The raw
    /// envelope rides along so the UI can surface or quarantine it;
    /// sibling envelopes in the same batch are unaffected.
    DeliveryError { reason: String, envelope: Envelope },
}
