//! Message-body encryption.
//!
//! XChaCha20-Poly1305 (192-bit nonce). Key: 32 bytes. Nonce: 24 bytes,
//! random per call. Tag: 16 bytes. The nonce travels in its own envelope
//! field rather than prefixed to the ciphertext.
//!
//! Message keys are single-use, so nonce reuse cannot occur across
//! messages; the random nonce still guards against reuse within a
//! process mistake.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng, Payload},
    XChaCha20Poly1305, XNonce,
};

use crate::error::CryptoError;
use crate::keys::SymmetricKey;

const BODY_AAD: &[u8] = b"dd-body-v1";

pub const NONCE_LEN: usize = 24;

/// Output of [`seal_body`]: nonce and ciphertext+tag, both raw bytes.
pub struct SealedBody {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Encrypt a message body under a single-use key with a fresh nonce.
pub fn seal_body(plaintext: &str, key: &SymmetricKey) -> Result<SealedBody, CryptoError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::AeadEncrypt)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: BODY_AAD,
            },
        )
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);

    Ok(SealedBody {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt a message body. Fails on tag mismatch or non-UTF-8 plaintext.
pub fn open_body(
    nonce: &[u8],
    ciphertext: &[u8],
    key: &SymmetricKey,
) -> Result<String, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::AeadDecrypt);
    }
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::AeadDecrypt)?;
    let nonce = XNonce::from_slice(nonce);

    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: BODY_AAD,
            },
        )
        .map_err(|_| CryptoError::AeadDecrypt)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::AeadDecrypt)
}
