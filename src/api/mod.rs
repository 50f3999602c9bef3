// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    envelope,
    error::ApiError,
    models::{
        ConnInfoResponse, IsActiveResponse, ListenQuery, Message, MessageStatus,
        SendMessageRequest, SendMessageResponse, TopicQuery,
    },
    state::AppState,
    store::StoreError,
};

pub mod conn;
pub mod health;
pub mod message;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/message/send", post(message::send_message))
        .route("/message/listen", get(message::listen_messages))
        .route("/conn/info", get(conn::connection_info))
        .route("/conn/active", get(conn::is_active))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        message::send_message,
        message::listen_messages,
        conn::connection_info,
        conn::is_active,
        health::health
    ),
    components(
        schemas(
            Message,
            MessageStatus,
            SendMessageRequest,
            SendMessageResponse,
            ConnInfoResponse,
            IsActiveResponse,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Message", description = "Encrypted message relay"),
        (name = "Connection", description = "Topic connection state"),
        (name = "Health", description = "Service health")
    )
)]
struct ApiDoc;

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::not_found(format!("message not found: {id}")),
            StoreError::AlreadyResolved(id) => {
                ApiError::conflict(format!("message already resolved: {id}"))
            }
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Validate a topic at the endpoint boundary: exactly 64 lowercase hex chars.
pub(crate) fn validate_topic(topic: &str) -> Result<(), ApiError> {
    if envelope::is_topic(topic) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "topic must be 64 lowercase hex characters",
        ))
    }
}

/// The caller's IP: first `X-Forwarded-For` hop if present, else the socket
/// peer address.
pub(crate) fn client_ip(headers: &HeaderMap, ConnectInfo(addr): &ConnectInfo<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}
