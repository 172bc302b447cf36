//! Delivery pipeline integration tests: two identities, a shared
//! mailbox, and the full seal → append → drain → open → event path.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use tokio::sync::mpsc;
use tokio::time::timeout;

use dd_channel::{
    ChannelError, ChannelEvent, FileMailbox, MailboxTransport, MemoryMailbox, Messenger,
};
use dd_store::IdentityStore;

const RECV_TIMEOUT: Duration = Duration::from_secs(10);
// Long enough that polls only happen when a test calls poll_now.
const MANUAL_POLL: Duration = Duration::from_secs(3600);

fn messenger_in(
    dir: &tempfile::TempDir,
    name: &str,
    transport: Arc<dyn MailboxTransport>,
) -> Messenger {
    let store = IdentityStore::open(dir.path().join(format!("{name}.json"))).unwrap();
    Messenger::new(Arc::new(store), transport).with_poll_interval(MANUAL_POLL)
}

async fn next_event(rx: &mut mpsc::Receiver<ChannelEvent>) -> ChannelEvent {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn alice_to_bob_end_to_end_over_file_mailbox() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox: Arc<dyn MailboxTransport> =
        Arc::new(FileMailbox::open(dir.path().join("mailboxes")).unwrap());

    let alice = messenger_in(&dir, "alice", mailbox.clone());
    let bob = messenger_in(&dir, "bob", mailbox.clone());

    let alice_id = alice.ensure_identity().unwrap();
    let bob_id = bob.ensure_identity().unwrap();

    // Bob registers Alice by her identity key; this mints Bob's
    // conversation key pair for the relationship.
    let bob_side = bob
        .add_contact(&alice_id.user_id, &alice_id.public_b64())
        .unwrap();

    // The out-of-band step, made explicit: Bob hands Alice the
    // conversation public key, and Alice registers Bob under it.
    alice
        .add_contact(&bob_id.user_id, &bob_side.conversation_public_b64())
        .unwrap();

    let sent = alice.send_message(&bob_id.user_id, "hi").await.unwrap();
    assert_eq!(sent.sender_id, alice_id.user_id);
    assert_eq!(sent.recipient_id, bob_id.user_id);

    let mut events = bob.start_listening().await.unwrap();
    bob.poll_now().await.unwrap();

    match next_event(&mut events).await {
        ChannelEvent::MessageReceived {
            sender_id,
            plaintext,
            ..
        } => {
            assert_eq!(sender_id, alice_id.user_id);
            assert_eq!(plaintext, "hi");
        }
        other => panic!("expected MessageReceived, got {other:?}"),
    }

    bob.stop_listening().await.unwrap();
}

#[tokio::test]
async fn one_bad_envelope_never_blocks_its_batch() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = Arc::new(MemoryMailbox::new());

    let alice = messenger_in(&dir, "alice", mailbox.clone());
    let bob = messenger_in(&dir, "bob", mailbox.clone());

    let alice_id = alice.ensure_identity().unwrap();
    let bob_id = bob.ensure_identity().unwrap();
    let bob_side = bob
        .add_contact(&alice_id.user_id, &alice_id.public_b64())
        .unwrap();
    alice
        .add_contact(&bob_id.user_id, &bob_side.conversation_public_b64())
        .unwrap();

    alice.send_message(&bob_id.user_id, "first").await.unwrap();
    alice.send_message(&bob_id.user_id, "second").await.unwrap();
    alice.send_message(&bob_id.user_id, "third").await.unwrap();

    // Tamper with the middle envelope in place.
    {
        let mut batch = mailbox.drain_and_clear(&bob_id.user_id).await.unwrap();
        assert_eq!(batch.len(), 3);
        let mut raw = URL_SAFE_NO_PAD.decode(&batch[1].ciphertext).unwrap();
        raw[0] ^= 0xFF;
        batch[1].ciphertext = URL_SAFE_NO_PAD.encode(raw);
        for envelope in &batch {
            mailbox.append(&bob_id.user_id, envelope).await.unwrap();
        }
    }

    let mut events = bob.start_listening().await.unwrap();
    bob.poll_now().await.unwrap();

    // Exactly 2 successes and 1 failure, in original batch order.
    match next_event(&mut events).await {
        ChannelEvent::MessageReceived { plaintext, .. } => assert_eq!(plaintext, "first"),
        other => panic!("expected first MessageReceived, got {other:?}"),
    }
    match next_event(&mut events).await {
        ChannelEvent::DeliveryError { reason, envelope } => {
            assert!(reason.contains(&alice_id.user_id));
            assert_eq!(envelope.sender_id, alice_id.user_id);
        }
        other => panic!("expected DeliveryError, got {other:?}"),
    }
    match next_event(&mut events).await {
        ChannelEvent::MessageReceived { plaintext, .. } => assert_eq!(plaintext, "third"),
        other => panic!("expected last MessageReceived, got {other:?}"),
    }

    bob.stop_listening().await.unwrap();
}

#[tokio::test]
async fn envelope_from_unregistered_sender_is_a_delivery_error() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = Arc::new(MemoryMailbox::new());

    let bob = messenger_in(&dir, "bob", mailbox.clone());
    let bob_id = bob.ensure_identity().unwrap();

    // A stranger seals something plausible to Bob's identity key.
    let stranger = dd_crypto::EncryptionKeyPair::generate().unwrap();
    let envelope = dd_proto::seal(
        "who dis",
        "stranger-id",
        &bob_id.user_id,
        &stranger.public,
    )
    .unwrap();
    mailbox.append(&bob_id.user_id, &envelope).await.unwrap();

    let mut events = bob.start_listening().await.unwrap();
    bob.poll_now().await.unwrap();

    match next_event(&mut events).await {
        ChannelEvent::DeliveryError { reason, envelope } => {
            assert!(reason.contains("stranger-id"));
            assert_eq!(envelope.sender_id, "stranger-id");
        }
        other => panic!("expected DeliveryError, got {other:?}"),
    }

    bob.stop_listening().await.unwrap();
}

#[tokio::test]
async fn reply_without_conversation_key_exchange_fails_to_decrypt() {
    // Bob registered Alice by her IDENTITY key, so his replies wrap
    // under it; Alice's inbound key for Bob is her conversation pair.
    // Without the out-of-band exchange of Alice's conversation public
    // key the reply must surface as a DeliveryError, not plaintext.
    let dir = tempfile::tempdir().unwrap();
    let mailbox = Arc::new(MemoryMailbox::new());

    let alice = messenger_in(&dir, "alice", mailbox.clone());
    let bob = messenger_in(&dir, "bob", mailbox.clone());

    let alice_id = alice.ensure_identity().unwrap();
    let bob_id = bob.ensure_identity().unwrap();
    let bob_side = bob
        .add_contact(&alice_id.user_id, &alice_id.public_b64())
        .unwrap();
    alice
        .add_contact(&bob_id.user_id, &bob_side.conversation_public_b64())
        .unwrap();

    bob.send_message(&alice_id.user_id, "reply").await.unwrap();

    let mut events = alice.start_listening().await.unwrap();
    alice.poll_now().await.unwrap();

    match next_event(&mut events).await {
        ChannelEvent::DeliveryError { reason, .. } => {
            assert!(reason.contains(&bob_id.user_id));
        }
        other => panic!("expected DeliveryError, got {other:?}"),
    }

    alice.stop_listening().await.unwrap();
}

#[tokio::test]
async fn second_listener_is_rejected_while_first_is_live() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = Arc::new(MemoryMailbox::new());
    let bob = messenger_in(&dir, "bob", mailbox);
    bob.ensure_identity().unwrap();

    let _events = bob.start_listening().await.unwrap();
    assert!(matches!(
        bob.start_listening().await,
        Err(ChannelError::AlreadyListening)
    ));

    bob.stop_listening().await.unwrap();
    // After a clean stop a fresh listener may start.
    let _events = bob.start_listening().await.unwrap();
    bob.stop_listening().await.unwrap();
}

#[tokio::test]
async fn stop_without_start_is_not_listening() {
    let dir = tempfile::tempdir().unwrap();
    let bob = messenger_in(&dir, "bob", Arc::new(MemoryMailbox::new()));
    bob.ensure_identity().unwrap();
    assert!(matches!(
        bob.stop_listening().await,
        Err(ChannelError::NotListening)
    ));
}

#[tokio::test]
async fn send_requires_identity_and_known_recipient() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = Arc::new(MemoryMailbox::new());
    let alice = messenger_in(&dir, "alice", mailbox);

    assert!(matches!(
        alice.send_message("whoever", "hello").await,
        Err(ChannelError::NoIdentity)
    ));

    alice.ensure_identity().unwrap();
    assert!(matches!(
        alice.send_message("whoever", "hello").await,
        Err(ChannelError::UnknownRecipient(_))
    ));
}

#[tokio::test]
async fn listening_requires_identity() {
    let dir = tempfile::tempdir().unwrap();
    let bob = messenger_in(&dir, "bob", Arc::new(MemoryMailbox::new()));
    assert!(matches!(
        bob.start_listening().await,
        Err(ChannelError::NoIdentity)
    ));
}
