//! Contact records.
//!
//! A contact couples two distinct pieces of key material that must never
//! be conflated:
//!   - `remote_public_key` — THEIR key, supplied out-of-band when the
//!     contact is added; outgoing message keys are wrapped under it.
//!   - `conversation_keypair` — OUR key pair for this relationship,
//!     generated locally at add time; incoming envelopes from this
//!     contact unwrap under its secret half. The public half must be
//!     handed to the peer out-of-band, or their messages to us will
//!     never decrypt.
//!
//! The remote key is trusted as supplied; key verification is the
//! caller's concern.

use std::fmt;

use dd_crypto::{EncryptionKeyPair, PublicKeyBytes};

#[derive(Clone)]
pub struct Contact {
    pub contact_id: String,
    /// The peer's public key; outbound wrap target.
    pub remote_public_key: PublicKeyBytes,
    /// Our locally generated pair for this relationship; inbound unwrap key.
    pub conversation_keypair: EncryptionKeyPair,
    /// When the contact was added, epoch millis.
    pub added_at_ms: i64,
}

impl Contact {
    /// The conversation public key to hand to the peer out-of-band.
    pub fn conversation_public_b64(&self) -> String {
        self.conversation_keypair.public_b64()
    }
}

impl fmt::Debug for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contact")
            .field("contact_id", &self.contact_id)
            .field("remote_public_key", &self.remote_public_key)
            .field("conversation_public_key", &self.conversation_keypair.public)
            .field("added_at_ms", &self.added_at_ms)
            .finish()
    }
}
