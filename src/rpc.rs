// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the relay endpoints, shared by both bridge sides.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config;
use crate::error::BridgeError;
use crate::models::{
    ConnInfoResponse, IsActiveResponse, Message, SendMessageRequest, SendMessageResponse,
};

/// Per-request timeout. Must exceed the server's ~30 s long-poll budget so a
/// fruitless listen returns an empty body instead of a transport error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Typed wrapper over the relay's `/v1` surface.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base: Url,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let base = Url::parse(base_url)?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(BridgeError::Transport)?;
        Ok(Self { http, base })
    }

    /// Client for the relay named by `BRIDGE_RELAY_URL` (local default).
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::new(&config::relay_url())
    }

    fn endpoint(&self, path: &str) -> Result<Url, BridgeError> {
        Ok(self.base.join(path)?)
    }

    /// The browser approval page for a topic. The only URL that ever carries
    /// the secret in cleartext, and it goes straight into the user's own
    /// browser rather than through the relay store.
    pub fn approval_url(&self, topic: &str, secret_hex: &str) -> Result<Url, BridgeError> {
        let mut url = self.endpoint("/connect/active")?;
        url.query_pairs_mut()
            .append_pair("topic", topic)
            .append_pair("key", secret_hex);
        Ok(url)
    }

    async fn check<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BridgeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown relay failure")
                .to_string(),
        };
        Err(BridgeError::Relay {
            status: status.as_u16(),
            message,
        })
    }

    /// `message.send`: post a fresh request or resolve an existing one.
    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<String, BridgeError> {
        let response = self
            .http
            .post(self.endpoint("/v1/message/send")?)
            .json(request)
            .send()
            .await?;
        let body: SendMessageResponse = Self::check(response).await?;
        Ok(body.id)
    }

    /// `message.listen`: long-poll for fresh messages.
    pub async fn listen(
        &self,
        topic: &str,
        since_ms: i64,
        id: Option<&str>,
    ) -> Result<Vec<Message>, BridgeError> {
        let mut url = self.endpoint("/v1/message/listen")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("topic", topic);
            pairs.append_pair("timestamp", &since_ms.to_string());
            if let Some(id) = id {
                pairs.append_pair("id", id);
            }
        }
        let response = self.http.get(url).send().await?;
        Self::check(response).await
    }

    /// `conn.info`: recorded first-poster IP next to the caller's own.
    pub async fn conn_info(&self, topic: &str) -> Result<ConnInfoResponse, BridgeError> {
        let mut url = self.endpoint("/v1/conn/info")?;
        url.query_pairs_mut().append_pair("topic", topic);
        let response = self.http.get(url).send().await?;
        Self::check(response).await
    }

    /// `conn.isActive`: whether a browser session currently polls the topic.
    pub async fn is_active(&self, topic: &str) -> Result<bool, BridgeError> {
        let mut url = self.endpoint("/v1/conn/active")?;
        url.query_pairs_mut().append_pair("topic", topic);
        let response = self.http.get(url).send().await?;
        let body: IsActiveResponse = Self::check(response).await?;
        Ok(body.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_url_carries_topic_and_key() {
        let relay = RelayClient::new("http://127.0.0.1:8080").expect("client");
        let url = relay
            .approval_url(&"a".repeat(64), &"b".repeat(64))
            .expect("url");
        assert_eq!(url.path(), "/connect/active");
        let query = url.query().expect("query");
        assert!(query.contains(&format!("topic={}", "a".repeat(64))));
        assert!(query.contains(&format!("key={}", "b".repeat(64))));
    }

    #[test]
    fn from_env_builds_against_configured_relay() {
        assert!(RelayClient::from_env().is_ok());
    }

    #[test]
    fn rejects_malformed_base_url() {
        assert!(matches!(
            RelayClient::new("not a url"),
            Err(BridgeError::Url(_))
        ));
    }
}
