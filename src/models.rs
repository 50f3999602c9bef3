// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay Data Model
//!
//! Wire types shared by the relay endpoints, the HTTP client, and both
//! bridges. All types derive `Serialize`, `Deserialize`, and `ToSchema` for
//! automatic JSON handling and OpenAPI documentation.
//!
//! JSON uses camelCase field names: the relay protocol predates this server
//! and both bridge sides already speak that convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// =============================================================================
// Message
// =============================================================================

/// Lifecycle state of a relayed message.
///
/// Every message is created `pending` and resolved exactly once to `success`
/// or `error` by the browser side. No other transitions exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Success,
    Error,
}

/// A single request/response record in a topic mailbox.
///
/// `req` and `res` are envelope ciphertext; the relay never sees plaintext.
/// Resolved messages (`res` non-null) are immutable.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned identifier (UUID v4).
    pub id: String,
    /// Mailbox address: hex SHA-256 of the shared secret.
    pub topic: String,
    /// Chain identifier the request targets (opaque to the relay).
    pub chain_id: String,
    /// Cleartext method name, used for display and store queries only.
    pub method: String,
    /// Encrypted request payload.
    pub req: String,
    /// Encrypted response payload, set on resolution.
    pub res: Option<String>,
    pub status: MessageStatus,
    /// Cleartext failure summary when `status == error`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Transport Payload (plaintext, inside the envelope)
// =============================================================================

/// Wallet network a request is addressed to.
///
/// Selecting the adapter by this enum (rather than a string key) makes adding
/// a network a compile-time-checked extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Evm,
    Svm,
    Tvm,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Evm => f.write_str("evm"),
            Network::Svm => f.write_str("svm"),
            Network::Tvm => f.write_str("tvm"),
        }
    }
}

/// The wallet call carried inside an encrypted request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    /// Network-specific method name (e.g. `eth_sendTransaction`, `signMessage`).
    pub method: String,
    /// Method parameters, opaque to the bridge.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Decrypted request body exchanged between the two bridges.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransportData {
    pub network: Network,
    pub chain_id: String,
    pub data: RequestPayload,
}

// =============================================================================
// Endpoint Request/Response Types
// =============================================================================

/// Body of `POST /v1/message/send`.
///
/// Without `id` this creates a pending message (client side posting a fresh
/// request); with `id` it resolves an existing one (browser side supplying
/// the result) and must carry `res` and a terminal `status`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub topic: String,
    pub chain_id: String,
    pub method: String,
    pub req: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `POST /v1/message/send`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageResponse {
    /// Id of the created or resolved message.
    pub id: String,
}

/// Query of `GET /v1/message/listen`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListenQuery {
    /// Topic to poll (64 hex chars).
    pub topic: String,
    /// Only messages created strictly after this Unix-millisecond timestamp.
    #[serde(default)]
    pub timestamp: i64,
    /// Optional filter to a single message; with it set, only resolved
    /// messages qualify.
    #[serde(default)]
    pub id: Option<String>,
}

/// Query naming a single topic (`/v1/conn/*`).
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct TopicQuery {
    /// Topic to inspect (64 hex chars).
    pub topic: String,
}

/// Response of `GET /v1/conn/info`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnInfoResponse {
    /// IP that first posted to this topic, if any. First-write-wins; a
    /// phishing signal, not access control.
    pub topic_ip: Option<String>,
    /// The caller's own IP as the relay sees it.
    pub client_ip: String,
}

/// Response of `GET /v1/conn/active`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IsActiveResponse {
    /// Whether the topic's heartbeat was refreshed within the active window.
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_camel_case() {
        let msg = Message {
            id: "m1".into(),
            topic: "t".into(),
            chain_id: "1".into(),
            method: "signMessage".into(),
            req: "00ff".into(),
            res: None,
            status: MessageStatus::Pending,
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(json["chainId"], "1");
        assert_eq!(json["status"], "pending");
        assert!(json["res"].is_null());
    }

    #[test]
    fn transport_data_round_trips() {
        let data = TransportData {
            network: Network::Svm,
            chain_id: "1".into(),
            data: RequestPayload {
                method: "signMessage".into(),
                params: serde_json::json!("hello"),
            },
        };
        let json = serde_json::to_string(&data).expect("serialize");
        assert!(json.contains(r#""network":"svm""#));
        let back: TransportData = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, data);
    }

    #[test]
    fn request_payload_params_default_to_null() {
        let payload: RequestPayload =
            serde_json::from_str(r#"{"method":"eth_chainId"}"#).expect("deserialize");
        assert!(payload.params.is_null());
    }
}
