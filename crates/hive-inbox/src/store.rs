//! SQLite message store.
//!
//! # Table design
//!
//! One row per delivered copy: routing fans a broadcast out to concrete
//! recipients before insertion, so `recipient` is always a single agent id
//! and "read" is naturally per-recipient. Indexes cover the three access
//! paths the API serves: inbox by recipient, audit by sender, and
//! time-bounded search.

use crate::error::{InboxError, Result};
use chrono::{DateTime, Utc};
use hive_core::types::Priority;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// StoredMessage / MessageQuery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub content: String,
    pub priority: Priority,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl StoredMessage {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
        subject: Option<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipient: recipient.into(),
            subject,
            content: content.into(),
            priority,
            sent_at: Utc::now(),
            read: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    /// Substring match against subject and content.
    pub text: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub unread_only: bool,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// MessageStore
// ---------------------------------------------------------------------------

pub struct MessageStore {
    conn: Mutex<Connection>,
}

impl MessageStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| InboxError::Sqlite(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, for tests and ephemeral deployments.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                 id        TEXT PRIMARY KEY,
                 sender    TEXT NOT NULL,
                 recipient TEXT NOT NULL,
                 subject   TEXT,
                 content   TEXT NOT NULL,
                 priority  TEXT NOT NULL,
                 sent_at   TEXT NOT NULL,
                 read      INTEGER NOT NULL DEFAULT 0
             );
             CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages (recipient, read);
             CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages (sender);
             CREATE INDEX IF NOT EXISTS idx_messages_sent_at ON messages (sent_at);",
        )?;
        Ok(())
    }

    pub fn insert(&self, message: &StoredMessage) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            "INSERT INTO messages (id, sender, recipient, subject, content, priority, sent_at, read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id,
                message.sender,
                message.recipient,
                message.subject,
                message.content,
                message.priority.as_str(),
                message.sent_at.to_rfc3339(),
                message.read as i64,
            ],
        )?;
        Ok(())
    }

    /// Messages for one recipient, newest first.
    pub fn inbox(&self, recipient: &str, unread_only: bool, limit: usize) -> Result<Vec<StoredMessage>> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let sql = format!(
            "SELECT id, sender, recipient, subject, content, priority, sent_at, read
             FROM messages WHERE recipient = ?1 {} ORDER BY sent_at DESC LIMIT {limit}",
            if unread_only { "AND read = 0" } else { "" },
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![recipient], row_to_message)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn mark_read(&self, message_id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let changed = conn.execute(
            "UPDATE messages SET read = 1 WHERE id = ?1",
            params![message_id],
        )?;
        if changed == 0 {
            return Err(InboxError::MessageNotFound(message_id.to_string()));
        }
        Ok(())
    }

    pub fn unread_count(&self, recipient: &str) -> Result<u64> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE recipient = ?1 AND read = 0",
            params![recipient],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn search(&self, query: &MessageQuery) -> Result<Vec<StoredMessage>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if let Some(sender) = &query.sender {
            args.push(sender.clone());
            clauses.push(format!("sender = ?{}", args.len()));
        }
        if let Some(recipient) = &query.recipient {
            args.push(recipient.clone());
            clauses.push(format!("recipient = ?{}", args.len()));
        }
        if let Some(text) = &query.text {
            args.push(format!("%{text}%"));
            let n = args.len();
            clauses.push(format!(
                "(content LIKE ?{n} OR COALESCE(subject, '') LIKE ?{n})"
            ));
        }
        if let Some(since) = &query.since {
            args.push(since.to_rfc3339());
            clauses.push(format!("sent_at >= ?{}", args.len()));
        }
        if query.unread_only {
            clauses.push("read = 0".to_string());
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let limit = query.limit.unwrap_or(100);
        let sql = format!(
            "SELECT id, sender, recipient, subject, content, priority, sent_at, read
             FROM messages {where_clause} ORDER BY sent_at DESC LIMIT {limit}"
        );

        let conn = self.conn.lock().expect("store lock poisoned");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_message)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Retention cleanup. Returns how many rows were deleted.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let deleted = conn.execute(
            "DELETE FROM messages WHERE sent_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    let priority: String = row.get(5)?;
    let priority = priority.parse::<Priority>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let sent_at: String = row.get(6)?;
    let sent_at = DateTime::parse_from_rfc3339(&sent_at)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);
    let read: i64 = row.get(7)?;

    Ok(StoredMessage {
        id: row.get(0)?,
        sender: row.get(1)?,
        recipient: row.get(2)?,
        subject: row.get(3)?,
        content: row.get(4)?,
        priority,
        sent_at,
        read: read != 0,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MessageStore {
        MessageStore::open_in_memory().unwrap()
    }

    fn msg(sender: &str, recipient: &str, content: &str) -> StoredMessage {
        StoredMessage::new(sender, recipient, content, None, Priority::Medium)
    }

    #[test]
    fn insert_then_inbox() {
        let store = store();
        store.insert(&msg("supervisor", "testing", "Run suite")).unwrap();

        let inbox = store.inbox("testing", false, 50).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sender, "supervisor");
        assert_eq!(inbox[0].content, "Run suite");
        assert!(!inbox[0].read);
    }

    #[test]
    fn inbox_filters_unread() {
        let store = store();
        let first = msg("a", "b", "one");
        store.insert(&first).unwrap();
        store.insert(&msg("a", "b", "two")).unwrap();
        store.mark_read(&first.id).unwrap();

        let unread = store.inbox("b", true, 50).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].content, "two");
        assert_eq!(store.unread_count("b").unwrap(), 1);
    }

    #[test]
    fn mark_read_unknown_id_fails() {
        let store = store();
        assert!(matches!(
            store.mark_read("nope"),
            Err(InboxError::MessageNotFound(_))
        ));
    }

    #[test]
    fn search_by_sender_and_text() {
        let store = store();
        store.insert(&msg("supervisor", "a", "deploy now")).unwrap();
        store.insert(&msg("supervisor", "b", "hold off")).unwrap();
        store.insert(&msg("random", "a", "deploy later")).unwrap();

        let hits = store
            .search(&MessageQuery {
                sender: Some("supervisor".into()),
                text: Some("deploy".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].recipient, "a");
    }

    #[test]
    fn search_matches_subject() {
        let store = store();
        let mut m = msg("a", "b", "body text");
        m.subject = Some("urgent: rollback".into());
        store.insert(&m).unwrap();

        let hits = store
            .search(&MessageQuery {
                text: Some("rollback".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn prune_deletes_only_old_rows() {
        let store = store();
        let mut old = msg("a", "b", "stale");
        old.sent_at = Utc::now() - chrono::Duration::days(90);
        store.insert(&old).unwrap();
        store.insert(&msg("a", "b", "fresh")).unwrap();

        let deleted = store
            .prune_older_than(Utc::now() - chrono::Duration::days(30))
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.inbox("b", false, 50).unwrap().len(), 1);
    }

    #[test]
    fn priority_survives_roundtrip() {
        let store = store();
        let mut m = msg("a", "b", "hot");
        m.priority = Priority::Critical;
        store.insert(&m).unwrap();
        let inbox = store.inbox("b", false, 10).unwrap();
        assert_eq!(inbox[0].priority, Priority::Critical);
    }
}
