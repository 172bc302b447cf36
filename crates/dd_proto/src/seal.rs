//! Building and opening hybrid envelopes.
//!
//! Outbound: fresh message key → body seal → key wrap under the PEER's
//! conversation public key. Inbound: key unwrap under OUR conversation
//! secret registered for that peer → body open. The two key roles are
//! distinct parameters on purpose; they are never the same pair.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;

use dd_crypto::{aead, wrap, EncryptionKeyPair, PublicKeyBytes, SymmetricKey};

use crate::envelope::{Envelope, ENVELOPE_VERSION};
use crate::error::ProtoError;

/// Seal `plaintext` for `recipient_id`, wrapping the message key under
/// `recipient_public`. On any failure nothing partial escapes; the
/// caller gets an error and no envelope.
pub fn seal(
    plaintext: &str,
    sender_id: &str,
    recipient_id: &str,
    recipient_public: &PublicKeyBytes,
) -> Result<Envelope, ProtoError> {
    let wrap_err = |source| ProtoError::Encryption {
        recipient_id: recipient_id.to_string(),
        source,
    };

    let key = SymmetricKey::generate();
    let sealed = aead::seal_body(plaintext, &key).map_err(wrap_err)?;
    let wrapped_key = wrap::wrap_key(&key, recipient_public).map_err(wrap_err)?;

    Ok(Envelope {
        version: ENVELOPE_VERSION,
        sender_id: sender_id.to_string(),
        recipient_id: recipient_id.to_string(),
        wrapped_key: URL_SAFE_NO_PAD.encode(wrapped_key),
        iv: URL_SAFE_NO_PAD.encode(sealed.nonce),
        ciphertext: URL_SAFE_NO_PAD.encode(sealed.ciphertext),
        sent_at_ms: Utc::now().timestamp_millis(),
    })
}

/// Open an envelope with the conversation key pair registered for its
/// sender. Never returns partial or garbage plaintext: every stage
/// either succeeds or maps to a typed error naming the sender.
pub fn open(envelope: &Envelope, conversation: &EncryptionKeyPair) -> Result<String, ProtoError> {
    envelope.validate()?;

    let wrapped = Envelope::decode_field("wrapped_key", &envelope.wrapped_key)?;
    let key = wrap::unwrap_key(&wrapped, conversation).map_err(|_| ProtoError::KeyUnwrap {
        sender_id: envelope.sender_id.clone(),
    })?;

    let iv = Envelope::decode_field("iv", &envelope.iv)?;
    let ciphertext = Envelope::decode_field("ciphertext", &envelope.ciphertext)?;
    aead::open_body(&iv, &ciphertext, &key).map_err(|_| ProtoError::BodyDecrypt {
        sender_id: envelope.sender_id.clone(),
    })
}
