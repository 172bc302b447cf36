//! Asymmetric key transport.
//!
//! Encrypts a single-use `SymmetricKey` to a recipient's X25519 public key:
//!
//!   1. Generate an ephemeral X25519 keypair.
//!   2. DH(ephemeral secret, recipient public) → shared secret.
//!   3. HKDF-SHA256(shared, salt="dd-key-wrap-v1") → 32-byte wrapping key.
//!   4. XChaCha20-Poly1305 over the key bytes, AAD "dd-key-wrap".
//!
//! Wire format: [ eph_pub (32) | nonce (24) | ciphertext + tag (48) ]
//!
//! Only the holder of the matching X25519 secret can redo the DH and
//! unwrap; everyone else hits the authentication tag.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng, Payload},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::{EncryptionKeyPair, PublicKeyBytes, SymmetricKey};

const EPH_PUB_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const WRAP_AAD: &[u8] = b"dd-key-wrap";
const WRAP_SALT: &[u8] = b"dd-key-wrap-v1";

fn derive_wrap_key(shared: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(WRAP_SALT), shared);
    let mut out = [0u8; 32];
    hk.expand(b"wrap-key", &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(Zeroizing::new(out))
}

/// Wrap `key` so that only `recipient_public`'s owner can recover it.
pub fn wrap_key(
    key: &SymmetricKey,
    recipient_public: &PublicKeyBytes,
) -> Result<Vec<u8>, CryptoError> {
    let recipient = recipient_public.as_x25519()?;

    let eph_secret = StaticSecret::random_from_rng(OsRng);
    let eph_public = X25519Public::from(&eph_secret);
    let shared = eph_secret.diffie_hellman(&recipient);

    let wrap_key = derive_wrap_key(shared.as_bytes())?;
    let cipher = XChaCha20Poly1305::new_from_slice(wrap_key.as_ref())
        .map_err(|_| CryptoError::KeyWrap)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: key.as_bytes(),
                aad: WRAP_AAD,
            },
        )
        .map_err(|_| CryptoError::KeyWrap)?;

    let mut out = Vec::with_capacity(EPH_PUB_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(eph_public.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Recover a wrapped key with the conversation secret it was wrapped for.
pub fn unwrap_key(
    wrapped: &[u8],
    keypair: &EncryptionKeyPair,
) -> Result<SymmetricKey, CryptoError> {
    if wrapped.len() < EPH_PUB_LEN + NONCE_LEN {
        return Err(CryptoError::KeyUnwrap);
    }
    let (eph_bytes, rest) = wrapped.split_at(EPH_PUB_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let eph_arr: [u8; 32] = eph_bytes.try_into().map_err(|_| CryptoError::KeyUnwrap)?;
    let eph_public = X25519Public::from(eph_arr);
    let shared = keypair.static_secret().diffie_hellman(&eph_public);

    let wrap_key = derive_wrap_key(shared.as_bytes())?;
    let cipher = XChaCha20Poly1305::new_from_slice(wrap_key.as_ref())
        .map_err(|_| CryptoError::KeyUnwrap)?;
    let nonce = XNonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: WRAP_AAD,
            },
        )
        .map_err(|_| CryptoError::KeyUnwrap)?;

    let plaintext = Zeroizing::new(plaintext);
    SymmetricKey::from_bytes(&plaintext).map_err(|_| CryptoError::KeyUnwrap)
}
