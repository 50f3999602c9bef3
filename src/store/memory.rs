// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory relay store, used by tests and single-process development runs.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Message, MessageStatus};

use super::{active_window, RelayStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    messages: HashMap<String, Message>,
    topic_ips: HashMap<String, String>,
    heartbeats: HashMap<String, DateTime<Utc>>,
}

/// HashMap-backed [`RelayStore`]. All state is lost on process exit.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdate a heartbeat marker. Test hook for expiry behavior.
    #[cfg(test)]
    pub(crate) fn set_heartbeat(&self, topic: &str, when: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("store lock");
        inner.heartbeats.insert(topic.to_string(), when);
    }
}

impl RelayStore for MemoryStore {
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

        let mut inner = self.inner.lock().expect("store lock");
        inner
            .topic_ips
            .entry(topic.to_string())
            .or_insert_with(|| client_ip.to_string());
        inner.messages.insert(message.id.clone(), message.clone());
        Ok(message)
    }

    fn resolve_message(
        &self,
        id: &str,
        res: &str,
        status: MessageStatus,
        error: Option<&str>,
    ) -> StoreResult<Message> {
        let mut inner = self.inner.lock().expect("store lock");
        let message = inner
            .messages
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if message.res.is_some() {
            return Err(StoreError::AlreadyResolved(id.to_string()));
        }
        message.res = Some(res.to_string());
        message.status = status;
        message.error = error.map(str::to_string);
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    fn messages_since(
        &self,
        topic: &str,
        since_ms: i64,
        id: Option<&str>,
    ) -> StoreResult<Vec<Message>> {
        let inner = self.inner.lock().expect("store lock");
        let mut rows: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| m.topic == topic && m.created_at.timestamp_millis() > since_ms)
            .filter(|m| match id {
                Some(id) => m.id == id && m.res.is_some(),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    fn touch_active(&self, topic: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.heartbeats.insert(topic.to_string(), Utc::now());
        Ok(())
    }

    fn is_active(&self, topic: &str) -> StoreResult<bool> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner
            .heartbeats
            .get(topic)
            .is_some_and(|seen| Utc::now() - *seen < active_window()))
    }

    fn topic_ip(&self, topic: &str) -> StoreResult<Option<String>> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.topic_ips.get(topic).cloned())
    }
}
