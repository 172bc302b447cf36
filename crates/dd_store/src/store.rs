//! The `IdentityStore`: one JSON state file behind a read/write lock.
//!
//! Concurrency discipline: the registry is read by both the send path
//! and the delivery poller while `add_contact` may run concurrently;
//! a single `RwLock` around the whole state gives single-writer /
//! multi-reader semantics, so a reader never observes a half-written
//! contact.
//!
//! Durability: every mutation rewrites the state file via a temp file,
//! flush, fsync and atomic rename BEFORE the mutating call returns. A
//! torn write can therefore never be read back as a half state; the
//! worst case is the previous complete state.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use dd_crypto::{EncryptionKeyPair, PublicKeyBytes};

use crate::contacts::Contact;
use crate::error::StoreError;
use crate::identity::Identity;

const STATE_VERSION: u32 = 1;

// ── Persisted layout ──────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct StoredState {
    version: u32,
    identity: Option<StoredIdentity>,
    contacts: BTreeMap<String, StoredContact>,
}

#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    user_id: String,
    secret_key: String,
}

#[derive(Serialize, Deserialize)]
struct StoredContact {
    remote_public_key: String,
    conversation_secret_key: String,
    added_at_ms: i64,
}

// ── In-memory state ───────────────────────────────────────────────────────────

struct State {
    identity: Option<Identity>,
    contacts: BTreeMap<String, Contact>,
}

/// Handle to the device's identity and contact registry.
pub struct IdentityStore {
    path: PathBuf,
    inner: RwLock<State>,
}

impl IdentityStore {
    /// Open the store at `path`, loading any persisted state. A missing
    /// file is a fresh store; an unparseable file is demoted to a fresh
    /// store with a warning (re-initialisation beats a permanent boot
    /// failure, at the documented cost of the old data).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read(&path) {
            Ok(bytes) => match Self::parse_state(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "state file unreadable, starting fresh");
                    State {
                        identity: None,
                        contacts: BTreeMap::new(),
                    }
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => State {
                identity: None,
                contacts: BTreeMap::new(),
            },
            Err(e) => return Err(StoreError::Persistence(e)),
        };
        Ok(Self {
            path,
            inner: RwLock::new(state),
        })
    }

    fn parse_state(bytes: &[u8]) -> Result<State, StoreError> {
        let stored: StoredState = serde_json::from_slice(bytes)?;
        if stored.version != STATE_VERSION {
            return Err(StoreError::InvalidArgument(format!(
                "unsupported state version {}",
                stored.version
            )));
        }

        let identity = match stored.identity {
            Some(id) => Some(Identity {
                user_id: id.user_id,
                keypair: EncryptionKeyPair::from_secret_b64(&id.secret_key)?,
            }),
            None => None,
        };

        let mut contacts = BTreeMap::new();
        for (contact_id, c) in stored.contacts {
            contacts.insert(
                contact_id.clone(),
                Contact {
                    contact_id,
                    remote_public_key: PublicKeyBytes::from_b64(&c.remote_public_key)?,
                    conversation_keypair: EncryptionKeyPair::from_secret_b64(
                        &c.conversation_secret_key,
                    )?,
                    added_at_ms: c.added_at_ms,
                },
            );
        }

        Ok(State { identity, contacts })
    }

    // ── Identity ─────────────────────────────────────────────────────────────

    /// Return the identity, creating and persisting one on first call.
    /// Idempotent after the first success: later calls (and later
    /// process runs) see the same user id and key pair.
    pub fn ensure_identity(&self) -> Result<Identity, StoreError> {
        let mut state = self.inner.write();
        if let Some(ref identity) = state.identity {
            return Ok(identity.clone());
        }

        let identity = Identity::generate()?;
        state.identity = Some(identity.clone());
        // Durable-before-return: if the write fails, the mutation must
        // not survive in memory either, or a restart would disagree
        // with what this process observed.
        if let Err(e) = self.persist(&state) {
            state.identity = None;
            return Err(e);
        }
        info!(user_id = %identity.user_id, "created new identity");
        Ok(identity)
    }

    /// The identity, if one has been created.
    pub fn identity(&self) -> Option<Identity> {
        self.inner.read().identity.clone()
    }

    // ── Contacts ─────────────────────────────────────────────────────────────

    /// Register a contact. Generates this side's conversation key pair;
    /// the returned contact carries its public half, which the caller
    /// must hand to the peer out-of-band before the peer can message us.
    pub fn add_contact(
        &self,
        contact_id: &str,
        remote_public_key_b64: &str,
    ) -> Result<Contact, StoreError> {
        let contact_id = contact_id.trim();
        if contact_id.is_empty() {
            return Err(StoreError::InvalidArgument("empty contact id".into()));
        }
        if remote_public_key_b64.trim().is_empty() {
            return Err(StoreError::InvalidArgument("empty public key".into()));
        }
        let remote_public_key = PublicKeyBytes::from_b64(remote_public_key_b64.trim())?;

        let mut state = self.inner.write();
        if state.contacts.contains_key(contact_id) {
            return Err(StoreError::DuplicateContact(contact_id.to_string()));
        }

        let contact = Contact {
            contact_id: contact_id.to_string(),
            remote_public_key,
            conversation_keypair: EncryptionKeyPair::generate()?,
            added_at_ms: Utc::now().timestamp_millis(),
        };
        state.contacts.insert(contact_id.to_string(), contact.clone());
        if let Err(e) = self.persist(&state) {
            state.contacts.remove(contact_id);
            return Err(e);
        }
        info!(contact_id, "added contact");
        Ok(contact)
    }

    /// Look up a contact. Absence is a valid result, not an error.
    pub fn contact(&self, contact_id: &str) -> Option<Contact> {
        self.inner.read().contacts.get(contact_id).cloned()
    }

    pub fn contact_ids(&self) -> Vec<String> {
        self.inner.read().contacts.keys().cloned().collect()
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    fn persist(&self, state: &State) -> Result<(), StoreError> {
        let stored = StoredState {
            version: STATE_VERSION,
            identity: state.identity.as_ref().map(|id| StoredIdentity {
                user_id: id.user_id.clone(),
                secret_key: id.keypair.secret_b64(),
            }),
            contacts: state
                .contacts
                .iter()
                .map(|(id, c)| {
                    (
                        id.clone(),
                        StoredContact {
                            remote_public_key: c.remote_public_key.to_b64(),
                            conversation_secret_key: c.conversation_keypair.secret_b64(),
                            added_at_ms: c.added_at_ms,
                        },
                    )
                })
                .collect(),
        };

        let bytes = serde_json::to_vec_pretty(&stored)?;
        let tmp = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> IdentityStore {
        IdentityStore::open(dir.path().join("state.json")).unwrap()
    }

    #[test]
    fn ensure_identity_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let first = store.ensure_identity().unwrap();
        let second = store.ensure_identity().unwrap();
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(first.public_b64(), second.public_b64());
    }

    #[test]
    fn identity_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let first = IdentityStore::open(&path).unwrap().ensure_identity().unwrap();
        let second = IdentityStore::open(&path).unwrap().ensure_identity().unwrap();
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(first.public_b64(), second.public_b64());
    }

    #[test]
    fn add_contact_generates_conversation_keys_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = IdentityStore::open(&path).unwrap();
        store.ensure_identity().unwrap();

        let peer = dd_crypto::EncryptionKeyPair::generate().unwrap();
        let contact = store.add_contact("peer-1", &peer.public_b64()).unwrap();
        assert_eq!(contact.remote_public_key, peer.public);
        // Conversation pair is ours, freshly generated: never the remote key.
        assert_ne!(contact.conversation_keypair.public, peer.public);

        let reopened = IdentityStore::open(&path).unwrap();
        let loaded = reopened.contact("peer-1").unwrap();
        assert_eq!(loaded.remote_public_key, peer.public);
        assert_eq!(
            loaded.conversation_public_b64(),
            contact.conversation_public_b64()
        );
    }

    #[test]
    fn duplicate_contact_is_rejected_and_original_unchanged() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let k1 = dd_crypto::EncryptionKeyPair::generate().unwrap();
        let k2 = dd_crypto::EncryptionKeyPair::generate().unwrap();

        store.add_contact("peer", &k1.public_b64()).unwrap();
        let err = store.add_contact("peer", &k2.public_b64()).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateContact(ref id) if id == "peer"));

        let stored = store.contact("peer").unwrap();
        assert_eq!(stored.remote_public_key, k1.public);
    }

    #[test]
    fn add_contact_rejects_empty_arguments() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let key = dd_crypto::EncryptionKeyPair::generate().unwrap();

        assert!(matches!(
            store.add_contact("  ", &key.public_b64()),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.add_contact("peer", ""),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn add_contact_rejects_malformed_key() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.add_contact("peer", "too-short"),
            Err(StoreError::Crypto(_))
        ));
    }

    #[test]
    fn unknown_contact_lookup_is_none_not_error() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.contact("nobody").is_none());
    }

    #[test]
    fn malformed_state_file_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{ this is not json").unwrap();

        let store = IdentityStore::open(&path).unwrap();
        assert!(store.identity().is_none());
        // Re-initialisation works and persists over the bad file.
        let identity = store.ensure_identity().unwrap();
        let reopened = IdentityStore::open(&path).unwrap();
        assert_eq!(reopened.identity().unwrap().user_id, identity.user_id);
    }

    #[test]
    fn contact_ids_enumerates_in_stable_order() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let key = dd_crypto::EncryptionKeyPair::generate().unwrap();
        store.add_contact("bbb", &key.public_b64()).unwrap();
        store.add_contact("aaa", &key.public_b64()).unwrap();
        assert_eq!(store.contact_ids(), vec!["aaa".to_string(), "bbb".to_string()]);
    }
}
