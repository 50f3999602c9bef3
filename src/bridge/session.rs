// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Browser Bridge Session
//!
//! One session per browser page. The session owns every piece of state the
//! listen/dispatch loop needs: the approved-connection map, the message log,
//! the de-duplication set, the write-confirmation queue, and one watcher
//! task per topic. Nothing is ambient; polling tasks receive the shared
//! state explicitly.
//!
//! ## Watchers
//!
//! Each approved topic gets a dedicated polling task with its own
//! `CancellationToken`, following the background-task pattern of the relay's
//! sibling services. A task issues at most one outstanding listen call at a
//! time; re-approving a topic cancels and replaces its watcher, and revoking
//! a topic cancels it outright, so shutdown is a first-class operation.
//!
//! ## Write confirmation
//!
//! Writes wait for the user. A single slot holds the request currently shown
//! for confirmation; further writes queue behind it in FIFO order and never
//! displace it. Reads dispatch immediately.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::envelope::{self, Secret};
use crate::error::BridgeError;
use crate::models::{
    ConnInfoResponse, Message, MessageStatus, Network, SendMessageRequest, TransportData,
};
use crate::rpc::RelayClient;

use super::adapters::AdapterSet;
use super::methods::{classify, MessageKind};

/// Pause before re-polling a topic after a transport failure.
const POLL_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Cursor lookback for a freshly approved topic, in milliseconds.
const INITIAL_LOOKBACK_MS: i64 = 30_000;

const USER_REJECTED: &str = "user rejected the request";

// =============================================================================
// Session State
// =============================================================================

/// An approved topic and the key material needed to serve it.
#[derive(Clone)]
pub struct ConnectionRecord {
    pub key: Secret,
    pub approved_at: DateTime<Utc>,
    /// First-poster IP recorded by the relay at approval time.
    pub topic_ip: Option<String>,
    /// Listen cursor: newest message creation time seen on this topic.
    last_seen_ms: i64,
}

/// A decrypted message as the session displays it.
#[derive(Debug, Clone)]
pub struct LoggedMessage {
    pub id: String,
    pub topic: String,
    pub chain_id: String,
    pub method: String,
    pub request: TransportData,
    pub response: Option<Value>,
    pub status: MessageStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A write request parked for user confirmation.
#[derive(Debug, Clone)]
struct PendingWrite {
    id: String,
    topic: String,
    chain_id: String,
    req: String,
    data: TransportData,
}

/// Read-only view of the request occupying the confirmation slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: String,
    pub topic: String,
    pub network: Network,
    pub method: String,
    pub params: Value,
}

#[derive(Default)]
struct SessionState {
    connections: HashMap<String, ConnectionRecord>,
    log: Vec<LoggedMessage>,
    seen: HashSet<String>,
    current: Option<PendingWrite>,
    queue: VecDeque<PendingWrite>,
    watchers: HashMap<String, CancellationToken>,
}

struct SessionInner {
    relay: RelayClient,
    adapters: AdapterSet,
    state: Mutex<SessionState>,
}

/// Browser half of the bridge.
#[derive(Clone)]
pub struct BridgeSession {
    inner: Arc<SessionInner>,
}

impl BridgeSession {
    pub fn new(relay: RelayClient, adapters: AdapterSet) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                relay,
                adapters,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Fetch the relay's view of a topic before approval, so the caller can
    /// show the IP comparison to the user.
    pub async fn connection_check(&self, topic: &str) -> Result<ConnInfoResponse, BridgeError> {
        self.inner.relay.conn_info(topic).await
    }

    /// Approve a connection request and start watching its topic.
    ///
    /// A topic-IP/client-IP mismatch blocks silent approval: the call fails
    /// with [`BridgeError::IpMismatch`] and the caller must present the
    /// signal to the user and retry with `allow_ip_mismatch` set.
    pub async fn approve(
        &self,
        topic: &str,
        key: Secret,
        allow_ip_mismatch: bool,
    ) -> Result<(), BridgeError> {
        if key.topic() != topic {
            return Err(BridgeError::KeyMismatch(topic.to_string()));
        }

        let info = self.inner.relay.conn_info(topic).await?;
        if let Some(topic_ip) = &info.topic_ip {
            if *topic_ip != info.client_ip && !allow_ip_mismatch {
                return Err(BridgeError::IpMismatch {
                    topic_ip: topic_ip.clone(),
                    client_ip: info.client_ip,
                });
            }
        }

        let now = Utc::now();
        {
            let mut state = self.inner.lock();
            let last_seen_ms = state
                .log
                .iter()
                .filter(|m| m.topic == topic)
                .map(|m| m.created_at.timestamp_millis())
                .max()
                .unwrap_or_else(|| now.timestamp_millis() - INITIAL_LOOKBACK_MS);
            state.connections.insert(
                topic.to_string(),
                ConnectionRecord {
                    key,
                    approved_at: now,
                    topic_ip: info.topic_ip,
                    last_seen_ms,
                },
            );
        }
        self.watch(topic);
        Ok(())
    }

    /// Start (or restart) the watcher task for an approved topic. Any
    /// previous watcher for the topic is cancelled first, so at most one
    /// poll is ever outstanding per topic.
    fn watch(&self, topic: &str) {
        let token = CancellationToken::new();
        {
            let mut state = self.inner.lock();
            if let Some(old) = state.watchers.insert(topic.to_string(), token.clone()) {
                old.cancel();
            }
        }
        let inner = Arc::clone(&self.inner);
        let topic = topic.to_string();
        tokio::spawn(async move { inner.poll_topic(topic, token).await });
    }

    /// Revoke a connection: cancel its in-flight poll, stop scheduling
    /// further polls, and drop the stored key.
    pub fn revoke(&self, topic: &str) {
        let mut state = self.inner.lock();
        state.connections.remove(topic);
        if let Some(token) = state.watchers.remove(topic) {
            token.cancel();
        }
    }

    /// Cancel every watcher. Called when the page/session ends.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        for token in state.watchers.values() {
            token.cancel();
        }
        state.watchers.clear();
    }

    /// Topics this session currently serves.
    pub fn topics(&self) -> Vec<String> {
        self.inner.lock().connections.keys().cloned().collect()
    }

    /// Snapshot of the decrypted message log, oldest first.
    pub fn messages(&self) -> Vec<LoggedMessage> {
        self.inner.lock().log.clone()
    }

    /// The write request currently awaiting user confirmation, if any.
    pub fn pending_write(&self) -> Option<PendingRequest> {
        self.inner.lock().current.as_ref().map(|p| PendingRequest {
            id: p.id.clone(),
            topic: p.topic.clone(),
            network: p.data.network,
            method: p.data.data.method.clone(),
            params: p.data.data.params.clone(),
        })
    }

    /// User confirmed the pending write: dispatch it to the wallet adapter
    /// and promote the next queued write into the slot.
    pub async fn confirm_pending(&self) -> Result<String, BridgeError> {
        let pending = self.inner.take_and_promote()?;
        let id = pending.id.clone();
        self.inner.dispatch(pending).await;
        Ok(id)
    }

    /// User dismissed the pending write: resolve it as a typed error through
    /// the encrypted channel and promote the next queued write.
    pub async fn dismiss_pending(&self) -> Result<String, BridgeError> {
        let pending = self.inner.take_and_promote()?;
        let id = pending.id.clone();

        let key = self.inner.connection_key(&pending.topic);
        if let Some(key) = key {
            self.inner
                .submit(
                    &pending,
                    &key,
                    json!({ "error": USER_REJECTED }),
                    MessageStatus::Error,
                    Some(USER_REJECTED.to_string()),
                )
                .await;
        }
        Ok(id)
    }

    /// Feed one relay message through the session pipeline. Test hook; the
    /// watcher tasks use the same path.
    #[cfg(test)]
    pub(crate) async fn ingest(&self, topic: &str, key: &Secret, message: Message) {
        self.inner.handle_message(topic, key, message).await;
    }
}

impl SessionInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state lock")
    }

    fn connection_key(&self, topic: &str) -> Option<Secret> {
        self.lock().connections.get(topic).map(|c| c.key.clone())
    }

    /// Take the confirmation-slot occupant and promote the next queued write
    /// in the same critical section, so a write arriving during the
    /// subsequent dispatch can never jump ahead of the queue.
    fn take_and_promote(&self) -> Result<PendingWrite, BridgeError> {
        let mut state = self.lock();
        let pending = state.current.take().ok_or(BridgeError::NothingPending)?;
        state.current = state.queue.pop_front();
        Ok(pending)
    }

    /// Watcher loop for one topic. Runs until the token is cancelled or the
    /// connection disappears; each iteration issues exactly one listen call.
    async fn poll_topic(self: Arc<Self>, topic: String, cancel: CancellationToken) {
        debug!(topic = %topic, "Topic watcher starting");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some((key, since_ms)) = ({
                let state = self.lock();
                state
                    .connections
                    .get(&topic)
                    .map(|c| (c.key.clone(), c.last_seen_ms))
            }) else {
                break;
            };

            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.relay.listen(&topic, since_ms, None) => outcome,
            };

            match outcome {
                Ok(messages) => {
                    for message in messages {
                        self.handle_message(&topic, &key, message).await;
                    }
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Topic poll failed, will retry");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(POLL_RETRY_PAUSE) => {}
                    }
                }
            }
        }
        debug!(topic = %topic, "Topic watcher stopped");
    }

    /// Decrypt, classify, and route one inbound message.
    async fn handle_message(&self, topic: &str, key: &Secret, message: Message) {
        {
            let mut state = self.lock();
            let duplicate = !state.seen.insert(message.id.clone());
            if let Some(conn) = state.connections.get_mut(topic) {
                conn.last_seen_ms = conn
                    .last_seen_ms
                    .max(message.created_at.timestamp_millis());
            }
            if duplicate {
                return;
            }
        }
        if message.res.is_some() {
            // A record this session (or a predecessor) already resolved.
            return;
        }

        let plaintext = match envelope::decrypt(&message.req, key) {
            Ok(p) => p,
            Err(e) => {
                // Not addressed to us or corrupted; never the user's error.
                debug!(id = %message.id, error = %e, "Skipping undecryptable message");
                return;
            }
        };
        let data: TransportData = match serde_json::from_str(&plaintext) {
            Ok(d) => d,
            Err(e) => {
                debug!(id = %message.id, error = %e, "Skipping malformed transport payload");
                return;
            }
        };

        let pending = PendingWrite {
            id: message.id.clone(),
            topic: topic.to_string(),
            chain_id: message.chain_id.clone(),
            req: message.req.clone(),
            data: data.clone(),
        };
        let entry = LoggedMessage {
            id: message.id,
            topic: topic.to_string(),
            chain_id: message.chain_id,
            method: data.data.method.clone(),
            request: data,
            response: None,
            status: MessageStatus::Pending,
            error: None,
            created_at: message.created_at,
        };

        match classify(pending.data.network, &pending.data.data.method) {
            MessageKind::Write => {
                let mut state = self.lock();
                state.log.push(entry);
                if state.current.is_some() || !state.queue.is_empty() {
                    state.queue.push_back(pending);
                } else {
                    state.current = Some(pending);
                }
            }
            MessageKind::Read => {
                self.lock().log.push(entry);
                self.dispatch(pending).await;
            }
        }
    }

    /// Run a request through its network adapter and submit the outcome.
    /// Failures travel back through the encrypted channel as
    /// `status = error`, never silently dropped.
    async fn dispatch(&self, pending: PendingWrite) {
        let Some(key) = self.connection_key(&pending.topic) else {
            debug!(topic = %pending.topic, "Connection revoked before dispatch");
            return;
        };

        let adapter = self.adapters.for_network(pending.data.network).clone();
        let outcome = adapter
            .request(
                &pending.data.chain_id,
                &pending.data.data.method,
                &pending.data.data.params,
            )
            .await;

        let (result, status, error) = match outcome {
            Ok(value) => (value, MessageStatus::Success, None),
            Err(e) => {
                let summary = e.to_string();
                (
                    json!({ "error": summary }),
                    MessageStatus::Error,
                    Some(summary),
                )
            }
        };
        self.submit(&pending, &key, result, status, error).await;
    }

    /// Encrypt a result and resolve the message on the relay, then update
    /// the local log.
    async fn submit(
        &self,
        pending: &PendingWrite,
        key: &Secret,
        result: Value,
        status: MessageStatus,
        error: Option<String>,
    ) {
        let ciphertext = match envelope::encrypt(&result.to_string(), key) {
            Ok(c) => c,
            Err(e) => {
                warn!(id = %pending.id, error = %e, "Could not encrypt wallet result");
                return;
            }
        };

        let request = SendMessageRequest {
            id: Some(pending.id.clone()),
            topic: pending.topic.clone(),
            chain_id: pending.chain_id.clone(),
            method: pending.data.data.method.clone(),
            req: pending.req.clone(),
            res: Some(ciphertext),
            status: Some(status),
            error: error.clone(),
        };
        if let Err(e) = self.relay.send_message(&request).await {
            warn!(id = %pending.id, error = %e, "Could not submit wallet result to relay");
        }

        let mut state = self.lock();
        if let Some(entry) = state.log.iter_mut().find(|m| m.id == pending.id) {
            entry.response = Some(result);
            entry.status = status;
            entry.error = error;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::OnceLock;

    use async_trait::async_trait;

    use super::*;
    use crate::api::router;
    use crate::bridge::adapters::testing::ScriptedAdapter;
    use crate::bridge::adapters::{AdapterError, WalletAdapter};
    use crate::client::ClientBridge;
    use crate::models::RequestPayload;
    use crate::state::AppState;
    use crate::store::RelayStore;

    /// Serve the relay on an ephemeral local port.
    async fn spawn_relay() -> (String, AppState) {
        let state = AppState::default();
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("serve");
        });
        (format!("http://{addr}"), state)
    }

    fn session(base_url: &str, adapter: Arc<ScriptedAdapter>) -> BridgeSession {
        BridgeSession::new(
            RelayClient::new(base_url).expect("relay client"),
            AdapterSet::uniform(adapter),
        )
    }

    fn transport(network: Network, method: &str, params: Value) -> TransportData {
        TransportData {
            network,
            chain_id: "1".to_string(),
            data: RequestPayload {
                method: method.to_string(),
                params,
            },
        }
    }

    /// Post an encrypted request straight into the store, as the client
    /// bridge would, and return the stored message.
    fn post_request(state: &AppState, secret: &Secret, data: &TransportData, ip: &str) -> Message {
        let plaintext = serde_json::to_string(data).expect("serialize");
        let ciphertext = envelope::encrypt(&plaintext, secret).expect("encrypt");
        state
            .store
            .insert_message(
                &secret.topic(),
                &data.chain_id,
                &data.data.method,
                &ciphertext,
                ip,
            )
            .expect("insert")
    }

    async fn wait_until(what: &str, cond: impl Fn() -> bool) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("timed out waiting for: {what}");
    }

    #[tokio::test]
    async fn approve_requires_matching_key() {
        let (url, _state) = spawn_relay().await;
        let session = session(&url, Arc::new(ScriptedAdapter::succeeding(json!(null))));

        let key = Secret::generate().expect("generate");
        let wrong_topic = "0".repeat(64);
        let err = session
            .approve(&wrong_topic, key, false)
            .await
            .expect_err("mismatched key");
        assert!(matches!(err, BridgeError::KeyMismatch(_)));
    }

    #[tokio::test]
    async fn ip_mismatch_blocks_silent_approval() {
        let (url, state) = spawn_relay().await;
        let session = session(&url, Arc::new(ScriptedAdapter::succeeding(json!(null))));

        let key = Secret::generate().expect("generate");
        let data = transport(Network::Svm, "signMessage", json!("hello"));
        // First post observed from an address that is not this machine.
        post_request(&state, &key, &data, "1.1.1.1");

        let info = session
            .connection_check(&key.topic())
            .await
            .expect("conn info");
        assert_eq!(info.topic_ip.as_deref(), Some("1.1.1.1"));

        let err = session
            .approve(&key.topic(), key.clone(), false)
            .await
            .expect_err("mismatch must block");
        match err {
            BridgeError::IpMismatch {
                topic_ip,
                client_ip,
            } => {
                assert_eq!(topic_ip, "1.1.1.1");
                assert_eq!(client_ip, "127.0.0.1");
            }
            other => panic!("expected IpMismatch, got {other:?}"),
        }

        // Explicit override proceeds.
        session
            .approve(&key.topic(), key, true)
            .await
            .expect("override approval");
        session.shutdown();
    }

    #[tokio::test]
    async fn read_requests_dispatch_without_confirmation() {
        let (url, state) = spawn_relay().await;
        let adapter = Arc::new(ScriptedAdapter::succeeding(json!({ "publicKey": "abc" })));
        let session = session(&url, adapter.clone());

        let key = Secret::generate().expect("generate");
        let data = transport(Network::Svm, "connect", Value::Null);
        let posted = post_request(&state, &key, &data, "127.0.0.1");

        session
            .approve(&key.topic(), key.clone(), false)
            .await
            .expect("approve");

        wait_until("read dispatched", || adapter.call_count() == 1).await;
        assert!(session.pending_write().is_none());

        // The result went back through the relay, encrypted.
        wait_until("message resolved", || {
            state
                .store
                .messages_since(&key.topic(), 0, Some(&posted.id))
                .expect("scan")
                .first()
                .is_some_and(|m| m.status == MessageStatus::Success)
        })
        .await;
        let resolved = state
            .store
            .messages_since(&key.topic(), 0, Some(&posted.id))
            .expect("scan")
            .remove(0);
        let plaintext =
            envelope::decrypt(resolved.res.as_deref().expect("res"), &key).expect("decrypt");
        assert_eq!(plaintext, r#"{"publicKey":"abc"}"#);

        session.shutdown();
    }

    #[tokio::test]
    async fn writes_wait_for_confirmation_and_queue_fifo() {
        let (url, state) = spawn_relay().await;
        let adapter = Arc::new(ScriptedAdapter::succeeding(json!({ "signature": "sig" })));
        let session = session(&url, adapter.clone());

        let key = Secret::generate().expect("generate");
        let first = transport(Network::Svm, "signMessage", json!("one"));
        let second = transport(Network::Svm, "signTransaction", json!("two"));
        let first_posted = post_request(&state, &key, &first, "127.0.0.1");
        // Distinct creation timestamps keep the relay's oldest-first order
        // deterministic.
        tokio::time::sleep(Duration::from_millis(5)).await;
        post_request(&state, &key, &second, "127.0.0.1");

        session
            .approve(&key.topic(), key.clone(), false)
            .await
            .expect("approve");

        wait_until("both writes logged", || session.messages().len() == 2).await;

        // Nothing dispatched yet; the first write holds the slot and the
        // second never displaces it.
        assert_eq!(adapter.call_count(), 0);
        let pending = session.pending_write().expect("slot occupied");
        assert_eq!(pending.id, first_posted.id);
        assert_eq!(pending.method, "signMessage");

        let confirmed = session.confirm_pending().await.expect("confirm first");
        assert_eq!(confirmed, first_posted.id);
        assert_eq!(adapter.call_count(), 1);

        // Second write was promoted into the slot.
        let promoted = session.pending_write().expect("second promoted");
        assert_eq!(promoted.method, "signTransaction");

        session.confirm_pending().await.expect("confirm second");
        assert_eq!(adapter.call_count(), 2);
        assert!(session.pending_write().is_none());
        assert!(matches!(
            session.confirm_pending().await,
            Err(BridgeError::NothingPending)
        ));

        session.shutdown();
    }

    /// Records what occupies the confirmation slot at the moment each
    /// dispatch reaches the wallet.
    struct SlotObservingAdapter {
        session: OnceLock<BridgeSession>,
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl WalletAdapter for SlotObservingAdapter {
        async fn request(
            &self,
            _chain_id: &str,
            _method: &str,
            _params: &Value,
        ) -> Result<Value, AdapterError> {
            let slot = self
                .session
                .get()
                .and_then(|s| s.pending_write())
                .map(|p| p.method);
            self.seen.lock().expect("seen lock").push(slot);
            Ok(json!("ok"))
        }
    }

    #[tokio::test]
    async fn queued_write_is_promoted_before_dispatch_starts() {
        let (url, state) = spawn_relay().await;
        let adapter = Arc::new(SlotObservingAdapter {
            session: OnceLock::new(),
            seen: Mutex::new(Vec::new()),
        });
        let session = BridgeSession::new(
            RelayClient::new(&url).expect("relay client"),
            AdapterSet::uniform(adapter.clone()),
        );
        let _ = adapter.session.set(session.clone());

        let key = Secret::generate().expect("generate");
        session
            .approve(&key.topic(), key.clone(), false)
            .await
            .expect("approve");
        session.shutdown();

        let first = transport(Network::Svm, "signMessage", json!("one"));
        let second = transport(Network::Svm, "signTransaction", json!("two"));
        let first_posted = post_request(&state, &key, &first, "127.0.0.1");
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second_posted = post_request(&state, &key, &second, "127.0.0.1");
        session.ingest(&key.topic(), &key, first_posted).await;
        session.ingest(&key.topic(), &key, second_posted).await;

        // While the first write's dispatch is in flight, the second already
        // holds the slot, so a write arriving mid-dispatch queues behind it
        // instead of jumping ahead.
        session.confirm_pending().await.expect("confirm first");
        assert_eq!(
            *adapter.seen.lock().expect("seen lock"),
            vec![Some("signTransaction".to_string())]
        );

        session.confirm_pending().await.expect("confirm second");
        assert_eq!(adapter.seen.lock().expect("seen lock").len(), 2);
        assert!(session.pending_write().is_none());
    }

    #[tokio::test]
    async fn dismiss_resolves_as_typed_error() {
        let (url, state) = spawn_relay().await;
        let adapter = Arc::new(ScriptedAdapter::succeeding(json!("unused")));
        let session = session(&url, adapter.clone());

        let key = Secret::generate().expect("generate");
        let data = transport(Network::Evm, "eth_sendTransaction", json!([{ "to": "0x0" }]));
        let posted = post_request(&state, &key, &data, "127.0.0.1");

        session
            .approve(&key.topic(), key.clone(), false)
            .await
            .expect("approve");
        wait_until("write parked", || session.pending_write().is_some()).await;

        session.dismiss_pending().await.expect("dismiss");
        assert_eq!(adapter.call_count(), 0);

        let resolved = state
            .store
            .messages_since(&key.topic(), 0, Some(&posted.id))
            .expect("scan")
            .remove(0);
        assert_eq!(resolved.status, MessageStatus::Error);
        assert_eq!(resolved.error.as_deref(), Some(USER_REJECTED));
        let plaintext =
            envelope::decrypt(resolved.res.as_deref().expect("res"), &key).expect("decrypt");
        assert_eq!(plaintext, json!({ "error": USER_REJECTED }).to_string());

        session.shutdown();
    }

    #[tokio::test]
    async fn duplicate_message_ids_are_processed_once() {
        let (url, state) = spawn_relay().await;
        let adapter = Arc::new(ScriptedAdapter::succeeding(json!("ok")));
        let session = session(&url, adapter.clone());

        let key = Secret::generate().expect("generate");

        // Register the connection, then stop its watcher so ingestion below
        // is the only consumer.
        session
            .approve(&key.topic(), key.clone(), false)
            .await
            .expect("approve");
        session.shutdown();

        let data = transport(Network::Svm, "connect", Value::Null);
        let posted = post_request(&state, &key, &data, "127.0.0.1");

        // Overlapping poll windows can deliver the same id twice.
        session.ingest(&key.topic(), &key, posted.clone()).await;
        session.ingest(&key.topic(), &key, posted).await;

        assert_eq!(adapter.call_count(), 1);
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn revoke_stops_polling() {
        let (url, state) = spawn_relay().await;
        let adapter = Arc::new(ScriptedAdapter::succeeding(json!("ok")));
        let session = session(&url, adapter.clone());

        let key = Secret::generate().expect("generate");
        session
            .approve(&key.topic(), key.clone(), false)
            .await
            .expect("approve");
        session.revoke(&key.topic());
        assert!(session.topics().is_empty());

        // A request arriving after revocation is never picked up.
        let data = transport(Network::Svm, "connect", Value::Null);
        post_request(&state, &key, &data, "127.0.0.1");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(adapter.call_count(), 0);
    }

    #[tokio::test]
    async fn end_to_end_sign_message() {
        let (url, state) = spawn_relay().await;
        let adapter = Arc::new(ScriptedAdapter::succeeding(json!({ "signature": "ed25519:feedface" })));
        let session = session(&url, adapter.clone());

        let secret = Secret::generate().expect("generate");
        let client = ClientBridge::with_secret(&url, secret.clone())
            .expect("client bridge")
            .open_browser(false)
            .wait_budget(Duration::from_secs(20));

        let request = transport(Network::Svm, "signMessage", json!("hello"));
        let send = tokio::spawn(async move { client.send(&request).await });

        // The user approves the topic once the request is in flight.
        let topic = secret.topic();
        wait_until("request posted", || {
            !state
                .store
                .messages_since(&topic, 0, None)
                .expect("scan")
                .is_empty()
        })
        .await;
        session
            .approve(&topic, secret.clone(), true)
            .await
            .expect("approve");

        wait_until("write parked for confirmation", || {
            session.pending_write().is_some()
        })
        .await;
        session.confirm_pending().await.expect("confirm");

        let response = send.await.expect("join").expect("bridged response");
        assert_eq!(response.status, MessageStatus::Success);
        assert_eq!(response.result, json!({ "signature": "ed25519:feedface" }));
        assert!(response.error.is_none());

        session.shutdown();
    }

    #[tokio::test]
    async fn unapproved_topic_times_out() {
        let (url, _state) = spawn_relay().await;

        let client = ClientBridge::new(&url)
            .expect("client bridge")
            .open_browser(false)
            .wait_budget(Duration::from_millis(600));

        let request = transport(Network::Svm, "signMessage", json!("nobody listens"));
        let err = client.send(&request).await.expect_err("must time out");
        assert!(matches!(err, BridgeError::Timeout));
    }
}
