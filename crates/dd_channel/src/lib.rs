//! dd_channel — Store-and-forward delivery for Deadrop Messenger
//!
//! The mailbox is the only thing connecting two devices: the sender
//! appends envelopes to the recipient's mailbox, and the recipient's
//! delivery poller periodically drains its own mailbox, opens each
//! envelope independently, and emits one event per item.
//!
//! The transport is a trait so the bundled file-backed simulation can
//! be swapped for a real network channel without touching the envelope
//! protocol or the poller.
//!
//! # Modules
//! - `transport`      — the `MailboxTransport` trait
//! - `file_mailbox`   — per-recipient JSON files (local P2P simulation)
//! - `memory_mailbox` — in-memory mailbox for tests and embedding
//! - `poller`         — the cancellable delivery loop
//! - `events`         — the event stream surface
//! - `messenger`      — the `Messenger` facade consumed by the UI layer
//! - `error`          — unified error types

pub mod error;
pub mod events;
pub mod file_mailbox;
pub mod memory_mailbox;
pub mod messenger;
pub mod poller;
pub mod transport;

pub use error::{ChannelError, TransportError};
pub use events::ChannelEvent;
pub use file_mailbox::FileMailbox;
pub use memory_mailbox::MemoryMailbox;
pub use messenger::Messenger;
pub use transport::MailboxTransport;
