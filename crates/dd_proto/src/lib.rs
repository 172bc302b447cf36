//! dd_proto — Wire types and envelope protocol for Deadrop Messenger
//!
//! An outgoing message is wrapped in a hybrid envelope: the body is
//! encrypted under a fresh single-use symmetric key, and that key is
//! wrapped under the recipient's conversation public key. The mailbox
//! (and any relay behind it) only ever sees the envelope.
//!
//! # Modules
//! - `envelope` — the on-wire envelope record with boundary validation
//! - `seal`     — building and opening envelopes
//! - `error`    — unified error type

pub mod envelope;
pub mod error;
pub mod seal;

pub use envelope::{Envelope, ENVELOPE_VERSION};
pub use error::ProtoError;
pub use seal::{open, seal};
