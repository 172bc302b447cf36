//! The mailbox transport seam.
//!
//! In production this is whatever actually moves bytes between devices
//! (a relay, a DHT, a direct link). The core only requires the two
//! operations below; everything else about delivery is the transport's
//! business.

use async_trait::async_trait;

use dd_proto::Envelope;

use crate::error::TransportError;

/// Store-and-forward mailbox, keyed by recipient id.
///
/// Implementations must make `drain_and_clear` atomic with respect to
/// concurrent `append` calls through the same handle: an envelope is
/// either returned by exactly one drain or still pending, never both
/// delivered and dropped.
#[async_trait]
pub trait MailboxTransport: Send + Sync {
    /// Append an envelope to `recipient_id`'s mailbox. Best-effort: the
    /// core performs no retries; retry policy belongs to the caller.
    async fn append(&self, recipient_id: &str, envelope: &Envelope)
        -> Result<(), TransportError>;

    /// Return all pending envelopes for `recipient_id`, in arrival
    /// order, and empty the mailbox. An empty mailbox is `Ok(vec![])`,
    /// not an error.
    ///
    /// Read-then-clear is inherently at-most-once: a crash between this
    /// call and the caller finishing its processing loses the batch.
    /// That is an accepted limitation of store-and-forward without
    /// acknowledgement, not something the core papers over.
    async fn drain_and_clear(&self, recipient_id: &str) -> Result<Vec<Envelope>, TransportError>;
}
