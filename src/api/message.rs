// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Message endpoints: post/resolve and the long-polling read.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    Json,
};

use crate::{
    error::ApiError,
    models::{ListenQuery, Message, MessageStatus, SendMessageRequest, SendMessageResponse},
    state::AppState,
};

use super::{client_ip, validate_topic};

/// Long-poll retry budget: up to 30 attempts, ~1 s apart, so a listen call
/// blocks its connection for at most ~30 s before returning empty.
const LISTEN_ATTEMPTS: u32 = 30;
const LISTEN_INTERVAL: Duration = Duration::from_secs(1);

/// Post a new encrypted request, or resolve an existing one.
///
/// Without `id` the call inserts a pending message and captures the caller's
/// IP as the topic's first-poster marker. With `id` it supplies the result:
/// `res` and a terminal `status` become mandatory, and resolving an
/// already-resolved message is rejected with 409.
///
/// Unauthenticated by design: privacy of the channel rests on possession of
/// the secret, not on server-side authorization.
#[utoipa::path(
    post,
    path = "/v1/message/send",
    tag = "Message",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message created or resolved", body = SendMessageResponse),
        (status = 400, description = "Structural validation failure"),
        (status = 404, description = "Unknown message id"),
        (status = 409, description = "Message already resolved")
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    connect_info: ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    validate_topic(&body.topic)?;
    if body.method.is_empty() {
        return Err(ApiError::bad_request("method must not be empty"));
    }

    let Some(id) = body.id else {
        let ip = client_ip(&headers, &connect_info);
        let message =
            state
                .store
                .insert_message(&body.topic, &body.chain_id, &body.method, &body.req, &ip)?;
        tracing::debug!(topic = %body.topic, id = %message.id, "Relay message posted");
        return Ok(Json(SendMessageResponse { id: message.id }));
    };

    let Some(res) = body.res else {
        return Err(ApiError::bad_request("resolving a message requires res"));
    };
    let status = match body.status {
        Some(MessageStatus::Success) => MessageStatus::Success,
        Some(MessageStatus::Error) => MessageStatus::Error,
        Some(MessageStatus::Pending) | None => {
            return Err(ApiError::bad_request(
                "resolving a message requires a terminal status",
            ));
        }
    };

    let message = state
        .store
        .resolve_message(&id, &res, status, body.error.as_deref())?;
    tracing::debug!(topic = %message.topic, id = %message.id, status = ?message.status, "Relay message resolved");
    Ok(Json(SendMessageResponse { id: message.id }))
}

/// Long-polling read of a topic mailbox.
///
/// Repeatedly queries for messages created after `timestamp` (optionally
/// filtered to one `id`, in which case only resolved messages qualify),
/// returning as soon as at least one row is found or empty once the retry
/// budget is exhausted. Store locks are never held across the sleeps, so
/// concurrent posts to other topics proceed independently.
///
/// A call without an `id` filter is the browser side polling for inbound
/// requests, and refreshes the topic's active-heartbeat marker.
#[utoipa::path(
    get,
    path = "/v1/message/listen",
    tag = "Message",
    params(ListenQuery),
    responses(
        (status = 200, description = "Fresh messages, possibly empty", body = [Message]),
        (status = 400, description = "Structural validation failure")
    )
)]
pub async fn listen_messages(
    State(state): State<AppState>,
    Query(query): Query<ListenQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    validate_topic(&query.topic)?;

    if query.id.is_none() {
        state.store.touch_active(&query.topic)?;
    }

    for attempt in 0..LISTEN_ATTEMPTS {
        let rows = state
            .store
            .messages_since(&query.topic, query.timestamp, query.id.as_deref())?;
        if !rows.is_empty() {
            return Ok(Json(rows));
        }
        if attempt + 1 < LISTEN_ATTEMPTS {
            tokio::time::sleep(LISTEN_INTERVAL).await;
        }
    }

    Ok(Json(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const TOPIC: &str = "4303a429d2dc55bdfb688c34eb6482c251334a9180629ae981258bd10d98fee4";

    fn connect_info() -> ConnectInfo<SocketAddr> {
        ConnectInfo("1.1.1.1:4000".parse().expect("addr"))
    }

    fn post_body(id: Option<String>) -> SendMessageRequest {
        SendMessageRequest {
            id,
            topic: TOPIC.to_string(),
            chain_id: "1".to_string(),
            method: "signMessage".to_string(),
            req: "00ff".to_string(),
            res: None,
            status: None,
            error: None,
        }
    }

    async fn post(state: &AppState, body: SendMessageRequest) -> Result<String, ApiError> {
        send_message(
            State(state.clone()),
            connect_info(),
            HeaderMap::new(),
            Json(body),
        )
        .await
        .map(|Json(resp)| resp.id)
    }

    #[tokio::test]
    async fn post_then_listen_round_trip() {
        let state = AppState::default();
        let id = post(&state, post_body(None)).await.expect("post");

        let Json(rows) = listen_messages(
            State(state.clone()),
            Query(ListenQuery {
                topic: TOPIC.to_string(),
                timestamp: 0,
                id: None,
            }),
        )
        .await
        .expect("listen");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].status, MessageStatus::Pending);

        // The no-id listen refreshed the heartbeat.
        assert!(state.store.is_active(TOPIC).expect("is_active"));
    }

    #[tokio::test]
    async fn listen_with_id_does_not_touch_heartbeat() {
        let state = AppState::default();
        let id = post(&state, post_body(None)).await.expect("post");
        state
            .store
            .resolve_message(&id, "beef", MessageStatus::Success, None)
            .expect("resolve");

        let Json(rows) = listen_messages(
            State(state.clone()),
            Query(ListenQuery {
                topic: TOPIC.to_string(),
                timestamp: 0,
                id: Some(id),
            }),
        )
        .await
        .expect("listen");
        assert_eq!(rows.len(), 1);
        assert!(!state.store.is_active(TOPIC).expect("is_active"));
    }

    #[tokio::test]
    async fn resolve_requires_res_and_terminal_status() {
        let state = AppState::default();
        let id = post(&state, post_body(None)).await.expect("post");

        let missing_res = post(&state, post_body(Some(id.clone()))).await;
        assert_eq!(
            missing_res.expect_err("res required").status,
            StatusCode::BAD_REQUEST
        );

        let mut pending = post_body(Some(id.clone()));
        pending.res = Some("beef".to_string());
        pending.status = Some(MessageStatus::Pending);
        assert_eq!(
            post(&state, pending).await.expect_err("terminal").status,
            StatusCode::BAD_REQUEST
        );

        let mut ok = post_body(Some(id.clone()));
        ok.res = Some("beef".to_string());
        ok.status = Some(MessageStatus::Success);
        assert_eq!(post(&state, ok).await.expect("resolve"), id);
    }

    #[tokio::test]
    async fn second_resolution_conflicts() {
        let state = AppState::default();
        let id = post(&state, post_body(None)).await.expect("post");

        let mut resolve = post_body(Some(id.clone()));
        resolve.res = Some("beef".to_string());
        resolve.status = Some(MessageStatus::Success);
        post(&state, resolve.clone()).await.expect("first resolve");

        resolve.res = Some("dead".to_string());
        let second = post(&state, resolve).await;
        assert_eq!(second.expect_err("conflict").status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn structural_validation_rejects_before_store() {
        let state = AppState::default();

        let mut bad_topic = post_body(None);
        bad_topic.topic = "nope".to_string();
        assert_eq!(
            post(&state, bad_topic).await.expect_err("topic").status,
            StatusCode::BAD_REQUEST
        );

        let mut bad_method = post_body(None);
        bad_method.method = String::new();
        assert_eq!(
            post(&state, bad_method).await.expect_err("method").status,
            StatusCode::BAD_REQUEST
        );

        // Nothing reached the store.
        assert!(state
            .store
            .messages_since(TOPIC, 0, None)
            .expect("scan")
            .is_empty());
    }

    #[tokio::test]
    async fn resolve_unknown_id_is_not_found() {
        let state = AppState::default();
        let mut body = post_body(Some("missing".to_string()));
        body.res = Some("beef".to_string());
        body.status = Some(MessageStatus::Error);
        assert_eq!(
            post(&state, body).await.expect_err("missing").status,
            StatusCode::NOT_FOUND
        );
    }
}
