// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable relay store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `messages`: id → serialized Message (JSON bytes)
//! - `topic_msg_index`: composite key (topic|timestamp_be|id) → id
//! - `topic_ips`: topic → first-poster IP
//! - `heartbeats`: topic → last-seen Unix milliseconds

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use uuid::Uuid;

use crate::models::{Message, MessageStatus};

use super::{active_window, RelayStore, StoreError, StoreResult};

/// Primary table: message id → serialized Message (JSON bytes).
const MESSAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("messages");

/// Index: composite key → message id.
/// Key format: `topic|timestamp_be|id` for ascending-time range scans.
const TOPIC_MSG_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("topic_msg_index");

/// Map: topic → IP of the first poster (never overwritten).
const TOPIC_IPS: TableDefinition<&str, &str> = TableDefinition::new("topic_ips");

/// Map: topic → heartbeat timestamp in Unix milliseconds.
const HEARTBEATS: TableDefinition<&str, i64> = TableDefinition::new("heartbeats");

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for the topic_msg_index table.
///
/// Format: `topic | timestamp_be_bytes | id`. Big-endian timestamps keep a
/// forward scan in ascending creation order; the id suffix disambiguates
/// messages created in the same millisecond.
fn make_index_key(topic: &str, timestamp_ms: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(topic.len() + 1 + 8 + 1 + id.len());
    key.extend_from_slice(topic.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(timestamp_ms as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

/// Lower bound for scanning messages in `topic` created after `since_ms`.
///
/// The cursor is clamped into the key's unsigned range: negative cursors
/// scan from the topic's beginning, and `i64::MAX` must not overflow the
/// strictly-after increment.
fn make_scan_start(topic: &str, since_ms: i64) -> Vec<u8> {
    let after = since_ms.saturating_add(1).max(0) as u64;
    let mut key = Vec::with_capacity(topic.len() + 1 + 8);
    key.extend_from_slice(topic.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&after.to_be_bytes());
    key
}

/// Upper bound for a topic range scan (prefix with 0xFF bytes appended).
fn make_scan_end(topic: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(topic.len() + 1 + 20);
    end.extend_from_slice(topic.as_bytes());
    end.push(b'|');
    end.extend_from_slice(&[0xFF; 20]);
    end
}

// =============================================================================
// RelayDatabase
// =============================================================================

/// Embedded ACID relay store.
pub struct RelayDatabase {
    db: Database,
}

impl RelayDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(MESSAGES)?;
            let _ = write_txn.open_table(TOPIC_MSG_INDEX)?;
            let _ = write_txn.open_table(TOPIC_IPS)?;
            let _ = write_txn.open_table(HEARTBEATS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Backdate a heartbeat marker. Test hook for expiry behavior.
    #[cfg(test)]
    pub(crate) fn set_heartbeat(&self, topic: &str, when_ms: i64) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut heartbeats = write_txn.open_table(HEARTBEATS)?;
            heartbeats.insert(topic, when_ms)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn read_message(&self, id: &str) -> StoreResult<Message> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MESSAGES)?;
        let guard = table
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(serde_json::from_slice(guard.value())?)
    }
}

impl RelayStore for RelayDatabase {
    fn insert_message(
        &self,
        topic: &str,
        chain_id: &str,
        method: &str,
        req: &str,
        client_ip: &str,
    ) -> StoreResult<Message> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            chain_id: chain_id.to_string(),
            method: method.to_string(),
            req: req.to_string(),
            res: None,
            status: MessageStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        };
        let serialized = serde_json::to_vec(&message)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut messages = write_txn.open_table(MESSAGES)?;
            messages.insert(message.id.as_str(), serialized.as_slice())?;

            let mut index = write_txn.open_table(TOPIC_MSG_INDEX)?;
            let key = make_index_key(topic, now.timestamp_millis(), &message.id);
            index.insert(key.as_slice(), message.id.as_str())?;

            let mut ips = write_txn.open_table(TOPIC_IPS)?;
            if ips.get(topic)?.is_none() {
                ips.insert(topic, client_ip)?;
            }
        }
        write_txn.commit()?;

        Ok(message)
    }

    fn resolve_message(
        &self,
        id: &str,
        res: &str,
        status: MessageStatus,
        error: Option<&str>,
    ) -> StoreResult<Message> {
        let write_txn = self.db.begin_write()?;
        let message = {
            let mut messages = write_txn.open_table(MESSAGES)?;
            let mut message: Message = {
                let guard = messages
                    .get(id)?
                    .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
                serde_json::from_slice(guard.value())?
            };
            if message.res.is_some() {
                return Err(StoreError::AlreadyResolved(id.to_string()));
            }
            message.res = Some(res.to_string());
            message.status = status;
            message.error = error.map(str::to_string);
            message.updated_at = Utc::now();

            let serialized = serde_json::to_vec(&message)?;
            messages.insert(id, serialized.as_slice())?;
            message
        };
        write_txn.commit()?;

        Ok(message)
    }

    fn messages_since(
        &self,
        topic: &str,
        since_ms: i64,
        id: Option<&str>,
    ) -> StoreResult<Vec<Message>> {
        if let Some(id) = id {
            return match self.read_message(id) {
                Ok(m)
                    if m.topic == topic
                        && m.created_at.timestamp_millis() > since_ms
                        && m.res.is_some() =>
                {
                    Ok(vec![m])
                }
                Ok(_) | Err(StoreError::NotFound(_)) => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }

        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TOPIC_MSG_INDEX)?;
        let messages = read_txn.open_table(MESSAGES)?;

        let start = make_scan_start(topic, since_ms);
        let end = make_scan_end(topic);

        let mut rows = Vec::new();
        for entry in index.range::<&[u8]>(start.as_slice()..end.as_slice())? {
            let (_, id_guard) = entry?;
            if let Some(guard) = messages.get(id_guard.value())? {
                rows.push(serde_json::from_slice(guard.value())?);
            }
        }
        Ok(rows)
    }

    fn touch_active(&self, topic: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut heartbeats = write_txn.open_table(HEARTBEATS)?;
            heartbeats.insert(topic, Utc::now().timestamp_millis())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn is_active(&self, topic: &str) -> StoreResult<bool> {
        let read_txn = self.db.begin_read()?;
        let heartbeats = read_txn.open_table(HEARTBEATS)?;
        let Some(guard) = heartbeats.get(topic)? else {
            return Ok(false);
        };
        let age_ms = Utc::now().timestamp_millis() - guard.value();
        Ok(age_ms < active_window().num_milliseconds())
    }

    fn topic_ip(&self, topic: &str) -> StoreResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let ips = read_txn.open_table(TOPIC_IPS)?;
        Ok(ips.get(topic)?.map(|guard| guard.value().to_string()))
    }
}
