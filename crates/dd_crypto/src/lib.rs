//! dd_crypto — Deadrop Messenger cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Zeroize all secret material on drop.
//! - All public APIs return opaque newtypes to prevent accidental misuse.
//!
//! # Module layout
//! - `keys`  — X25519 conversation key pairs + single-use message keys
//! - `wrap`  — asymmetric key transport (ephemeral X25519 + HKDF + AEAD)
//! - `aead`  — XChaCha20-Poly1305 message-body encrypt/decrypt
//! - `error` — unified error type

pub mod aead;
pub mod error;
pub mod keys;
pub mod wrap;

pub use error::CryptoError;
pub use keys::{EncryptionKeyPair, PublicKeyBytes, SymmetricKey};
