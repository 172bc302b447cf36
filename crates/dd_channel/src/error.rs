use thiserror::Error;

use dd_proto::ProtoError;
use dd_store::StoreError;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Mailbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mailbox serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Mailbox unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("No identity yet; call ensure_identity first")]
    NoIdentity,

    #[error("Unknown recipient {0}; add the contact first")]
    UnknownRecipient(String),

    #[error("Unknown sender {0}; no contact registered, cannot decrypt")]
    UnknownSender(String),

    #[error("A delivery listener is already running for this identity")]
    AlreadyListening,

    #[error("No delivery listener is running")]
    NotListening,

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
