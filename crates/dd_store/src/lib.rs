//! dd_store — Identity and contact storage for Deadrop Messenger
//!
//! Owns the device's long-lived identity (user id + encryption key pair)
//! and the registry of known contacts. All state lives in a single JSON
//! file that is durably rewritten before any mutating call returns, so a
//! restart deterministically observes every completed mutation.
//!
//! A missing or unparseable state file is treated as "no identity yet"
//! and re-initialised on the next `ensure_identity`. That trades silent
//! data loss for recoverability; the choice is logged at warn level.
//!
//! # Modules
//! - `identity` — device identity record
//! - `contacts` — contact record
//! - `store`    — the `IdentityStore` handle
//! - `error`    — unified error type

pub mod contacts;
pub mod error;
pub mod identity;
pub mod store;

pub use contacts::Contact;
pub use error::StoreError;
pub use identity::Identity;
pub use store::IdentityStore;
