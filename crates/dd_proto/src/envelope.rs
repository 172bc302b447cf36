//! Encrypted message envelope — what the mailbox (and any relay) sees.
//!
//! The mailbox only sees:
//!   - sender_id / recipient_id (needed for routing and key lookup)
//!   - wrapped_key  (message key, encrypted to the recipient)
//!   - iv           (body nonce)
//!   - ciphertext   (opaque bytes)
//!   - sent_at_ms   (sender-stamped epoch millis)
//!
//! It cannot see the plaintext or the message key. Envelopes are
//! immutable once created and consumed exactly once: draining a mailbox
//! clears it.
//!
//! All binary fields are base64url-encoded (no padding). Every envelope
//! crossing a trust boundary goes through [`Envelope::validate`] first;
//! malformed input is rejected with a typed error, never parsed
//! permissively.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// On-wire envelope, stored in and drained from mailboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u8,
    pub sender_id: String,
    pub recipient_id: String,
    /// Single-use message key, wrapped under the recipient's
    /// conversation public key. Base64.
    pub wrapped_key: String,
    /// Body nonce. Base64.
    pub iv: String,
    /// XChaCha20-Poly1305 ciphertext + tag of the message body. Base64.
    pub ciphertext: String,
    /// Sender clock, milliseconds since the Unix epoch.
    pub sent_at_ms: i64,
}

impl Envelope {
    /// Structural validation at the trust boundary. Does not touch any
    /// key material; cryptographic failures surface later, from open.
    pub fn validate(&self) -> Result<(), ProtoError> {
        if self.version != ENVELOPE_VERSION {
            return Err(ProtoError::InvalidEnvelope(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.sender_id.trim().is_empty() {
            return Err(ProtoError::InvalidEnvelope("empty sender_id".into()));
        }
        if self.recipient_id.trim().is_empty() {
            return Err(ProtoError::InvalidEnvelope("empty recipient_id".into()));
        }
        if self.sent_at_ms < 0 {
            return Err(ProtoError::InvalidEnvelope("negative sent_at_ms".into()));
        }
        let iv = Self::decode_field("iv", &self.iv)?;
        if iv.len() != dd_crypto::aead::NONCE_LEN {
            return Err(ProtoError::InvalidEnvelope(format!(
                "iv must be {} bytes, got {}",
                dd_crypto::aead::NONCE_LEN,
                iv.len()
            )));
        }
        Self::decode_field("wrapped_key", &self.wrapped_key)?;
        Self::decode_field("ciphertext", &self.ciphertext)?;
        Ok(())
    }

    pub(crate) fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, ProtoError> {
        URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| ProtoError::InvalidEnvelope(format!("field {name}: {e}")))
    }
}
