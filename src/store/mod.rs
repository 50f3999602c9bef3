// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay Store
//!
//! Durable append-only record of requests/responses keyed by topic, plus two
//! store-side markers:
//!
//! - **Topic IP**: the IP of whoever first posted to a topic, captured once
//!   and never overwritten (phishing signal, not access control).
//! - **Active heartbeat**: per-topic last-seen timestamp refreshed by the
//!   browser side's polling, consulted by the client side to decide whether
//!   the approval page must be opened.
//!
//! Two interchangeable backends satisfy the same [`RelayStore`] contract:
//! [`MemoryStore`] (tests, dev) and [`RelayDatabase`] (embedded redb).

use chrono::Duration;

use crate::models::{Message, MessageStatus};

pub mod db;
pub mod memory;

pub use db::RelayDatabase;
pub use memory::MemoryStore;

/// Heartbeat freshness window: a topic is active iff its marker was
/// refreshed within the last 40 seconds. Deliberately wider than one
/// server-side long-poll cycle (~30 s) so an attentive listener never
/// flickers inactive between polls.
pub fn active_window() -> Duration {
    Duration::seconds(40)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message not found: {0}")]
    NotFound(String),

    /// The message already carries a result. Resolution is at-most-once;
    /// repeated attempts are rejected rather than applied.
    #[error("message already resolved: {0}")]
    AlreadyResolved(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Message/connection semantics every relay backend must provide.
///
/// All operations are short and synchronous; the long-poll loop lives in the
/// endpoint layer and must never hold a backend lock across its sleeps.
pub trait RelayStore: Send + Sync {
    /// Insert a new pending message. If this is the first post ever observed
    /// for `topic`, record `client_ip` as the topic IP marker
    /// (first-write-wins, never updated again).
    fn insert_message(
        &self,
        topic: &str,
        chain_id: &str,
        method: &str,
        req: &str,
        client_ip: &str,
    ) -> StoreResult<Message>;

    /// Resolve a pending message with its encrypted result. Exactly-once:
    /// fails with [`StoreError::AlreadyResolved`] if `res` is already set.
    fn resolve_message(
        &self,
        id: &str,
        res: &str,
        status: MessageStatus,
        error: Option<&str>,
    ) -> StoreResult<Message>;

    /// Messages in `topic` created strictly after `since_ms` (Unix millis),
    /// oldest first. With an `id` filter, only that message qualifies and
    /// only once it carries a result.
    fn messages_since(
        &self,
        topic: &str,
        since_ms: i64,
        id: Option<&str>,
    ) -> StoreResult<Vec<Message>>;

    /// Refresh the active-heartbeat marker for `topic`.
    fn touch_active(&self, topic: &str) -> StoreResult<()>;

    /// Whether the heartbeat marker was refreshed within [`active_window`].
    fn is_active(&self, topic: &str) -> StoreResult<bool>;

    /// The recorded first-poster IP for `topic`, if any.
    fn topic_ip(&self, topic: &str) -> StoreResult<Option<String>>;
}
