//! File-backed mailbox: one JSON file per recipient under a root dir.
//!
//! This simulates P2P delivery on a shared filesystem; a real system
//! would put a network channel behind the same trait. Semantics match
//! the trait contract: append-only until drained, drain reads then
//! truncates, and an unparseable mailbox file drains as empty (logged)
//! rather than wedging delivery forever.
//!
//! All operations serialise through one async mutex per mailbox handle,
//! which makes drain atomic with respect to appends from the same
//! process. Cross-process writers would need real file locking; this
//! simulation does not claim that.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use dd_proto::Envelope;

use crate::error::TransportError;
use crate::transport::MailboxTransport;

pub struct FileMailbox {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileMailbox {
    /// Open a mailbox root, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, TransportError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn mailbox_path(&self, recipient_id: &str) -> Result<PathBuf, TransportError> {
        // Recipient ids become file names; refuse anything that could
        // escape the root.
        if recipient_id.is_empty()
            || !recipient_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            || recipient_id.starts_with('.')
        {
            return Err(TransportError::Unavailable(format!(
                "invalid recipient id {recipient_id:?}"
            )));
        }
        Ok(self.root.join(format!("{recipient_id}.json")))
    }

    fn read_queue(&self, path: &Path) -> Result<Vec<Envelope>, TransportError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TransportError::Io(e)),
        };
        match serde_json::from_slice(&bytes) {
            Ok(queue) => Ok(queue),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed mailbox file, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    fn write_queue(&self, path: &Path, queue: &[Envelope]) -> Result<(), TransportError> {
        let bytes = serde_json::to_vec_pretty(queue)?;
        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.flush()?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[async_trait]
impl MailboxTransport for FileMailbox {
    async fn append(
        &self,
        recipient_id: &str,
        envelope: &Envelope,
    ) -> Result<(), TransportError> {
        let path = self.mailbox_path(recipient_id)?;
        let _guard = self.lock.lock().await;
        let mut queue = self.read_queue(&path)?;
        queue.push(envelope.clone());
        self.write_queue(&path, &queue)
    }

    async fn drain_and_clear(&self, recipient_id: &str) -> Result<Vec<Envelope>, TransportError> {
        let path = self.mailbox_path(recipient_id)?;
        let _guard = self.lock.lock().await;
        let queue = self.read_queue(&path)?;
        if !queue.is_empty() || path.exists() {
            self.write_queue(&path, &[])?;
        }
        Ok(queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dd_proto::ENVELOPE_VERSION;
    use tempfile::tempdir;

    fn envelope(n: u8) -> Envelope {
        Envelope {
            version: ENVELOPE_VERSION,
            sender_id: "alice".into(),
            recipient_id: "bob".into(),
            wrapped_key: format!("key-{n}"),
            iv: format!("iv-{n}"),
            ciphertext: format!("ct-{n}"),
            sent_at_ms: n as i64,
        }
    }

    #[tokio::test]
    async fn append_then_drain_roundtrips_in_order() {
        let dir = tempdir().unwrap();
        let mailbox = FileMailbox::open(dir.path()).unwrap();

        for n in 1..=3 {
            mailbox.append("bob", &envelope(n)).await.unwrap();
        }
        let drained = mailbox.drain_and_clear("bob").await.unwrap();
        assert_eq!(
            drained.iter().map(|e| e.sent_at_ms).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn drain_clears_the_mailbox() {
        let dir = tempdir().unwrap();
        let mailbox = FileMailbox::open(dir.path()).unwrap();
        mailbox.append("bob", &envelope(1)).await.unwrap();

        assert_eq!(mailbox.drain_and_clear("bob").await.unwrap().len(), 1);
        assert!(mailbox.drain_and_clear("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_mailbox_drains_empty() {
        let dir = tempdir().unwrap();
        let mailbox = FileMailbox::open(dir.path()).unwrap();
        assert!(mailbox.drain_and_clear("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_mailbox_file_drains_empty_and_recovers() {
        let dir = tempdir().unwrap();
        let mailbox = FileMailbox::open(dir.path()).unwrap();
        fs::write(dir.path().join("bob.json"), b"not json at all").unwrap();

        assert!(mailbox.drain_and_clear("bob").await.unwrap().is_empty());
        // The bad file was reset; normal operation resumes.
        mailbox.append("bob", &envelope(1)).await.unwrap();
        assert_eq!(mailbox.drain_and_clear("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_path_escaping_recipient_ids() {
        let dir = tempdir().unwrap();
        let mailbox = FileMailbox::open(dir.path()).unwrap();
        for bad in ["../evil", "", "a/b", ".hidden"] {
            assert!(matches!(
                mailbox.append(bad, &envelope(1)).await,
                Err(TransportError::Unavailable(_))
            ));
        }
    }
}
