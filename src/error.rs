// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::envelope::EnvelopeError;

// =============================================================================
// HTTP Error
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

// =============================================================================
// Bridge Error
// =============================================================================

/// Failures surfaced by the client bridge and the browser-bridge session.
///
/// `Timeout` is a distinct, expected outcome (no listener responded within
/// the wait budget), not a transport fault. `IpMismatch` is a security
/// signal that blocks silent approval; callers must re-approve with an
/// explicit override.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("timed out waiting for a wallet response")]
    Timeout,

    #[error("relay transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("relay rejected the request ({status}): {message}")]
    Relay { status: u16, message: String },

    #[error("invalid relay URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("topic was first contacted from {topic_ip} but this browser is {client_ip}")]
    IpMismatch {
        topic_ip: String,
        client_ip: String,
    },

    #[error("key does not derive topic {0}")]
    KeyMismatch(String),

    #[error("no request awaiting confirmation")]
    NothingPending,
}
