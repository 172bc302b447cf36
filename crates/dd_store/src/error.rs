use thiserror::Error;

use dd_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Contact {0} already exists")]
    DuplicateContact(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
