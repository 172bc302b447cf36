//! Deadrop command-line front end.
//!
//! Thin UI layer over the core: identity bootstrap, contact management,
//! sending, and a foreground listener that prints decrypted messages as
//! the poller emits them. The "network" is a shared mailbox directory;
//! point two instances at the same --mailbox-dir to talk locally.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use tokio::signal;
use tracing::info;

use dd_channel::{ChannelEvent, FileMailbox, Messenger};
use dd_store::IdentityStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deadrop Messenger", long_about = None)]
struct Cli {
    /// Override the state directory (identity + contacts).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the shared mailbox directory (the simulated network).
    #[arg(long, global = true)]
    mailbox_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create (or show) this device's identity
    Init,
    /// Print this identity's public key for sharing with peers
    ShowKey,
    /// Register a contact by id and their base64 public key
    AddContact {
        contact_id: String,
        public_key: String,
    },
    /// List registered contacts
    Contacts,
    /// Encrypt and deliver a message to a contact's mailbox
    Send {
        recipient_id: String,
        message: String,
    },
    /// Poll this identity's mailbox and print messages until Ctrl+C
    Listen,
}

fn default_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("io", "deadrop", "messenger")
        .ok_or_else(|| anyhow!("cannot determine data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

fn build_messenger(cli: &Cli) -> Result<Messenger> {
    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    let mailbox_dir = cli
        .mailbox_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("mailboxes"));

    let store = IdentityStore::open(data_dir.join("state.json"))?;
    let mailbox = FileMailbox::open(&mailbox_dir)?;
    Ok(Messenger::new(Arc::new(store), Arc::new(mailbox)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let messenger = build_messenger(&cli)?;

    match cli.command {
        Commands::Init => {
            let identity = messenger.ensure_identity()?;
            println!("User ID:    {}", identity.user_id);
            println!("Public key: {}", identity.public_b64());
        }
        Commands::ShowKey => {
            let identity = messenger.ensure_identity()?;
            println!("{}", identity.public_b64());
            println!("fingerprint: {}", identity.keypair.public.fingerprint());
        }
        Commands::AddContact {
            contact_id,
            public_key,
        } => {
            messenger.ensure_identity()?;
            let contact = messenger.add_contact(&contact_id, &public_key)?;
            println!("Added contact {}.", contact.contact_id);
            println!(
                "Share this conversation key with them (they cannot message you without it):"
            );
            println!("{}", contact.conversation_public_b64());
        }
        Commands::Contacts => {
            let ids = messenger.contact_ids();
            if ids.is_empty() {
                println!("No contacts yet.");
            } else {
                for id in ids {
                    println!("{id}");
                }
            }
        }
        Commands::Send {
            recipient_id,
            message,
        } => {
            messenger.ensure_identity()?;
            let envelope = messenger.send_message(&recipient_id, &message).await?;
            println!(
                "Delivered to {}'s mailbox at {}.",
                envelope.recipient_id, envelope.sent_at_ms
            );
        }
        Commands::Listen => {
            let identity = messenger.ensure_identity()?;
            let mut events = messenger.start_listening().await?;
            info!(user_id = %identity.user_id, "listening; Ctrl+C to stop");

            loop {
                tokio::select! {
                    _ = signal::ctrl_c() => break,
                    event = events.recv() => match event {
                        Some(ChannelEvent::MessageReceived { sender_id, plaintext, .. }) => {
                            println!("[{sender_id}] {plaintext}");
                        }
                        Some(ChannelEvent::DeliveryError { reason, .. }) => {
                            eprintln!("delivery error: {reason}");
                        }
                        None => break,
                    },
                }
            }
            messenger.stop_listening().await?;
        }
    }

    Ok(())
}
