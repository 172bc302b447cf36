use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Key wrap failed")]
    KeyWrap,

    #[error("Key unwrap failed (wrong key pair or corrupted data)")]
    KeyUnwrap,

    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed (authentication tag mismatch, possible tampering)")]
    AeadDecrypt,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
