use crate::types::{Priority, Recipient};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub message_id: String,
    pub sender_id: String,
    pub recipient: Recipient,
    pub content: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl AgentMessage {
    pub fn new(
        sender_id: impl Into<String>,
        recipient: Recipient,
        content: impl Into<String>,
        subject: Option<String>,
        priority: Priority,
    ) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.into(),
            recipient,
            content: content.into(),
            subject,
            priority,
            timestamp: Utc::now(),
            read: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_is_unread() {
        let msg = AgentMessage::new(
            "supervisor",
            Recipient::Direct("testing".into()),
            "Run suite",
            None,
            Priority::Medium,
        );
        assert!(!msg.read);
        assert_eq!(msg.sender_id, "supervisor");
        assert!(msg.recipient.addresses("testing"));
    }
}
