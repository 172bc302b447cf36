//! Device identity.
//!
//! One identity per state file: a random, immutable user id plus the
//! device's long-lived encryption key pair. Created once on first
//! launch and never regenerated while valid persisted data exists.

use dd_crypto::EncryptionKeyPair;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::StoreError;

/// User ids are 100 lowercase hex chars (50 random bytes), long enough
/// that random generation is collision-free in practice.
pub const USER_ID_LEN: usize = 100;

#[derive(Clone)]
pub struct Identity {
    pub user_id: String,
    pub keypair: EncryptionKeyPair,
}

impl Identity {
    pub fn generate() -> Result<Self, StoreError> {
        Ok(Self {
            user_id: random_user_id(),
            keypair: EncryptionKeyPair::generate()?,
        })
    }

    /// The public key to share so peers can add this user as a contact.
    pub fn public_b64(&self) -> String {
        self.keypair.public_b64()
    }
}

fn random_user_id() -> String {
    let mut bytes = [0u8; USER_ID_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
