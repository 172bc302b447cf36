use thiserror::Error;

use dd_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum ProtoError {
    /// Sealing failed; nothing was handed to the transport.
    #[error("Encryption for {recipient_id} failed: {source}")]
    Encryption {
        recipient_id: String,
        #[source]
        source: CryptoError,
    },

    #[error("Cannot unwrap message key from {sender_id} (wrong conversation key or corrupted envelope)")]
    KeyUnwrap { sender_id: String },

    #[error("Cannot decrypt message body from {sender_id} (tampered or corrupted ciphertext)")]
    BodyDecrypt { sender_id: String },

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
