//! Key material.
//!
//! An `EncryptionKeyPair` (X25519) is a receive address for wrapped
//! message keys. The device identity owns one, and every contact
//! relationship gets its own, generated locally when the contact is
//! added. Public halves travel out-of-band as base64 text; secret
//! halves never leave the device that generated them.
//!
//! Each *message* gets one `SymmetricKey`, generated fresh at seal time
//! and transported only in wrapped (asymmetrically encrypted) form.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

// ── Newtype wrappers ──────────────────────────────────────────────────────────

/// 32-byte X25519 public key, base64url-encoded on the wire and in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyBytes(pub Vec<u8>);

impl PublicKeyBytes {
    pub fn to_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s)?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "Public key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Short hex fingerprint for display (SHA-256 of the key, first 8 bytes).
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0);
        hex::encode(&digest[..8])
    }

    pub(crate) fn as_x25519(&self) -> Result<X25519Public, CryptoError> {
        let arr: [u8; 32] = self
            .0
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Public key must be 32 bytes".into()))?;
        Ok(X25519Public::from(arr))
    }
}

// ── Encryption keypair ────────────────────────────────────────────────────────

/// X25519 key pair that wrapped message keys can be addressed to.
/// Drop clears the secret half via ZeroizeOnDrop.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKeyPair {
    #[zeroize(skip)]
    pub public: PublicKeyBytes,
    secret_bytes: [u8; 32],
}

impl Clone for EncryptionKeyPair {
    fn clone(&self) -> Self {
        Self {
            public: self.public.clone(),
            secret_bytes: self.secret_bytes,
        }
    }
}

impl EncryptionKeyPair {
    pub fn generate() -> Result<Self, CryptoError> {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKeyBytes(X25519Public::from(&secret).as_bytes().to_vec());
        Ok(Self {
            public,
            secret_bytes: secret.to_bytes(),
        })
    }

    /// Rebuild a key pair from its 32 secret bytes; the public half is
    /// recomputed, so a mismatched stored public key cannot sneak in.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "Secret key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        let secret = StaticSecret::from(arr);
        let public = PublicKeyBytes(X25519Public::from(&secret).as_bytes().to_vec());
        Ok(Self {
            public,
            secret_bytes: secret.to_bytes(),
        })
    }

    pub fn from_secret_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = URL_SAFE_NO_PAD.decode(s)?;
        Self::from_bytes(&bytes)
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_bytes
    }

    pub fn secret_b64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.secret_bytes)
    }

    /// Export the public key in base64 for out-of-band exchange.
    pub fn public_b64(&self) -> String {
        self.public.to_b64()
    }

    pub(crate) fn static_secret(&self) -> StaticSecret {
        StaticSecret::from(self.secret_bytes)
    }
}

// ── Single-use message key ────────────────────────────────────────────────────

/// 32-byte symmetric key. One per message; never serialised in plaintext.
#[derive(ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "Symmetric key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}
