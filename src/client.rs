// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Bridge
//!
//! Runs inside the offline agent process. Owns one secret for its lifetime,
//! encrypts outgoing wallet requests, posts them to the relay, opens the
//! user's browser to the approval page on first contact, and polls until a
//! response appears or the wait budget elapses.
//!
//! The poll loop is strictly sequential: one outstanding listen call at a
//! time, each clamped to the remaining budget, so the overall wait is a hard
//! deadline rather than an unbounded retry.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::envelope::{self, Secret};
use crate::error::BridgeError;
use crate::models::{MessageStatus, SendMessageRequest, TransportData};
use crate::rpc::RelayClient;

/// Default overall wait for a wallet response: five of the server's ~30 s
/// long-poll windows.
const DEFAULT_WAIT_BUDGET: Duration = Duration::from_secs(150);

/// Pause between listen calls when the relay itself is unreachable.
const TRANSPORT_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// The decrypted outcome of one bridged wallet request.
#[derive(Debug, Clone)]
pub struct BridgeResponse {
    pub status: MessageStatus,
    /// Decrypted response payload from the wallet adapter.
    pub result: Value,
    /// Cleartext failure summary relayed alongside `status == error`.
    pub error: Option<String>,
}

/// Offline half of the bridge.
///
/// A single instance must not reuse its secret across unrelated logical
/// sessions unless it explicitly intends to share the same mailbox (a
/// returning user); `new` generates a fresh secret per instance and
/// [`ClientBridge::with_secret`] pins one for tests or reconnection.
pub struct ClientBridge {
    relay: RelayClient,
    secret: Secret,
    topic: String,
    wait_budget: Duration,
    open_browser: bool,
}

impl ClientBridge {
    /// Bridge with a freshly generated secret.
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let secret = Secret::generate()?;
        Self::with_secret(base_url, secret)
    }

    /// Bridge pointed at the relay named by `BRIDGE_RELAY_URL`.
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::new(&crate::config::relay_url())
    }

    /// Bridge with a pinned secret (returning user, or tests).
    pub fn with_secret(base_url: &str, secret: Secret) -> Result<Self, BridgeError> {
        let topic = secret.topic();
        Ok(Self {
            relay: RelayClient::new(base_url)?,
            secret,
            topic,
            wait_budget: DEFAULT_WAIT_BUDGET,
            open_browser: true,
        })
    }

    /// Override the overall wait budget.
    pub fn wait_budget(mut self, budget: Duration) -> Self {
        self.wait_budget = budget;
        self
    }

    /// Disable the browser hand-off (headless runs and tests). The approval
    /// URL is still logged so a user can open it manually.
    pub fn open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// The mailbox address derived from this bridge's secret.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Relay one wallet request and wait for its decrypted response.
    ///
    /// Returns [`BridgeError::Timeout`] if no browser session resolves the
    /// message within the wait budget; callers are expected to report that
    /// as partial state, not abort on it.
    pub async fn send(&self, request: &TransportData) -> Result<BridgeResponse, BridgeError> {
        let plaintext = serde_json::to_string(request)?;
        let ciphertext = envelope::encrypt(&plaintext, &self.secret)?;

        let id = self
            .relay
            .send_message(&SendMessageRequest {
                id: None,
                topic: self.topic.clone(),
                chain_id: request.chain_id.clone(),
                method: request.data.method.clone(),
                req: ciphertext,
                res: None,
                status: None,
                error: None,
            })
            .await?;
        debug!(topic = %self.topic, id = %id, method = %request.data.method, "Posted bridged request");

        if !self.relay.is_active(&self.topic).await? {
            self.prompt_approval()?;
        }

        self.wait_for_result(&id).await
    }

    /// Hand the approval page to the user's browser. This is the only time
    /// the secret leaves process memory, and it goes directly into the
    /// user's browser navigation, never through the relay store.
    fn prompt_approval(&self) -> Result<(), BridgeError> {
        let url = self.relay.approval_url(&self.topic, &self.secret.to_hex())?;
        info!(%url, "No active wallet session for topic; requesting approval");
        if self.open_browser {
            if let Err(e) = webbrowser::open(url.as_str()) {
                warn!(error = %e, "Could not launch a browser; open the approval URL manually");
            }
        }
        Ok(())
    }

    async fn wait_for_result(&self, id: &str) -> Result<BridgeResponse, BridgeError> {
        let deadline = Instant::now() + self.wait_budget;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BridgeError::Timeout);
            }

            let listen = self.relay.listen(&self.topic, 0, Some(id));
            let messages = match tokio::time::timeout(remaining, listen).await {
                Err(_) => return Err(BridgeError::Timeout),
                Ok(Ok(messages)) => messages,
                Ok(Err(BridgeError::Transport(e))) => {
                    // Transient relay unreachability is retried inside the
                    // budget; everything else is terminal.
                    warn!(error = %e, "Relay unreachable while polling; retrying");
                    let pause = TRANSPORT_RETRY_PAUSE.min(remaining);
                    tokio::time::sleep(pause).await;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
            };

            if let Some(message) = messages.into_iter().find(|m| m.res.is_some()) {
                let Some(res) = message.res else { continue };
                let plaintext = envelope::decrypt(&res, &self.secret)?;
                let result: Value = serde_json::from_str(&plaintext)?;
                debug!(id = %message.id, status = ?message.status, "Bridged response received");
                return Ok(BridgeResponse {
                    status: message.status,
                    result,
                    error: message.error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_secret_same_topic() {
        let secret = Secret::generate().expect("generate");
        let a = ClientBridge::with_secret("http://127.0.0.1:1", secret.clone()).expect("bridge");
        let b = ClientBridge::with_secret("http://127.0.0.1:1", secret).expect("bridge");
        assert_eq!(a.topic(), b.topic());
    }

    #[test]
    fn fresh_instances_get_fresh_topics() {
        let a = ClientBridge::new("http://127.0.0.1:1").expect("bridge");
        let b = ClientBridge::new("http://127.0.0.1:1").expect("bridge");
        assert_ne!(a.topic(), b.topic());
    }

    #[test]
    fn from_env_builds_against_configured_relay() {
        // Whatever the environment holds, the configured URL must parse.
        let bridge = ClientBridge::from_env().expect("bridge");
        assert_eq!(bridge.topic().len(), 64);
    }
}
