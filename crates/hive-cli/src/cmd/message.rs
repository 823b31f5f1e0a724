use crate::output::{print_json, print_table};
use clap::Subcommand;
use hive_core::paths;
use hive_core::types::{Priority, Recipient};
use hive_inbox::routing::{AgentProfile, RouteRequest, Router};
use hive_inbox::store::{MessageStore, StoredMessage};
use hive_inbox::InboxError;
use std::path::Path;
use std::str::FromStr;

#[derive(Subcommand)]
pub enum MessageSubcommand {
    /// Send a message to an agent, or to everyone with recipient "*"
    Send {
        /// Sending agent id
        #[arg(long = "from")]
        sender: String,
        /// Recipient agent id, or "*" for broadcast
        recipient: String,
        #[arg(required = true)]
        content: Vec<String>,
        #[arg(long)]
        subject: Option<String>,
        /// low, medium, high, or critical
        #[arg(long, default_value = "medium")]
        priority: String,
    },
    /// Show an agent's inbox
    Inbox {
        agent_id: String,
        /// Only unread messages
        #[arg(long)]
        unread: bool,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Mark a message as read
    Read { message_id: String },
}

pub fn run(root: &Path, subcmd: MessageSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        MessageSubcommand::Send {
            sender,
            recipient,
            content,
            subject,
            priority,
        } => send(
            root,
            &sender,
            &recipient,
            &content.join(" "),
            subject,
            &priority,
            json,
        ),
        MessageSubcommand::Inbox {
            agent_id,
            unread,
            limit,
        } => inbox(root, &agent_id, unread, limit, json),
        MessageSubcommand::Read { message_id } => read(root, &message_id, json),
    }
}

fn send(
    root: &Path,
    sender: &str,
    recipient: &str,
    content: &str,
    subject: Option<String>,
    priority: &str,
    json: bool,
) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    let store = MessageStore::open(&paths::inbox_db_path(root))?;
    let router = Router::from_file(&paths::routing_path(root))?;

    let priority = Priority::from_str(priority)?;
    let recipient = Recipient::parse(recipient);
    let profiles: Vec<AgentProfile> = manager
        .snapshot()
        .agents
        .values()
        .map(|a| AgentProfile {
            agent_id: a.agent_id.clone(),
            capabilities: a.capabilities.iter().cloned().collect(),
        })
        .collect();

    let request = RouteRequest {
        sender: sender.to_string(),
        recipient: recipient.clone(),
        subject: subject.clone(),
        priority,
    };
    let recipients = router.route(&request, &profiles);
    for recipient_id in &recipients {
        store.insert(&StoredMessage::new(
            sender,
            recipient_id.clone(),
            content,
            subject.clone(),
            priority,
        ))?;
    }
    let message_id = manager.send_message(sender, recipient, content, subject, priority)?;

    if json {
        print_json(&serde_json::json!({
            "message_id": message_id,
            "recipients": recipients,
        }))?;
    } else {
        println!(
            "Sent message [{message_id}] to {}",
            if recipients.is_empty() {
                "nobody (routing matched an empty pool)".to_string()
            } else {
                recipients.join(", ")
            }
        );
    }
    Ok(())
}

fn inbox(root: &Path, agent_id: &str, unread: bool, limit: usize, json: bool) -> anyhow::Result<()> {
    let store = MessageStore::open(&paths::inbox_db_path(root))?;
    let messages = store.inbox(agent_id, unread, limit)?;
    let unread_count = store.unread_count(agent_id)?;

    if json {
        print_json(&serde_json::json!({
            "agent": agent_id,
            "messages": messages,
            "unread_count": unread_count,
        }))?;
        return Ok(());
    }

    if messages.is_empty() {
        println!("Inbox for '{agent_id}' is empty");
        return Ok(());
    }
    println!("Inbox for '{agent_id}' ({unread_count} unread)");
    print_table(
        &["ID", "FROM", "PRIORITY", "READ", "CONTENT"],
        messages
            .iter()
            .map(|m| {
                vec![
                    m.id.clone(),
                    m.sender.clone(),
                    m.priority.to_string(),
                    if m.read { "yes" } else { "no" }.to_string(),
                    m.content.clone(),
                ]
            })
            .collect(),
    );
    Ok(())
}

fn read(root: &Path, message_id: &str, json: bool) -> anyhow::Result<()> {
    let store = MessageStore::open(&paths::inbox_db_path(root))?;
    // The inbox store and the shared-state document keep separate copies
    // with separate ids; accept either.
    match store.mark_read(message_id) {
        Ok(()) => {}
        Err(InboxError::MessageNotFound(_)) => {
            let (_, manager) = super::open(root)?;
            manager.mark_message_read(message_id)?;
        }
        Err(e) => return Err(e.into()),
    }

    if json {
        print_json(&serde_json::json!({ "message_id": message_id, "read": true }))?;
    } else {
        println!("Marked [{message_id}] read");
    }
    Ok(())
}
