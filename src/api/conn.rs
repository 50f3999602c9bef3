// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Connection-state endpoints: topic IP inspection and heartbeat freshness.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    Json,
};

use crate::{
    error::ApiError,
    models::{ConnInfoResponse, IsActiveResponse, TopicQuery},
    state::AppState,
};

use super::{client_ip, validate_topic};

/// Report the topic's first-poster IP next to the caller's own IP.
///
/// The browser compares the two before approval: a mismatch means the
/// approval link was produced on a different machine than the one that
/// posted the request, which is the relay's phishing signal.
#[utoipa::path(
    get,
    path = "/v1/conn/info",
    tag = "Connection",
    params(TopicQuery),
    responses(
        (status = 200, description = "Recorded and caller IPs", body = ConnInfoResponse),
        (status = 400, description = "Structural validation failure")
    )
)]
pub async fn connection_info(
    State(state): State<AppState>,
    connect_info: ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<TopicQuery>,
) -> Result<Json<ConnInfoResponse>, ApiError> {
    validate_topic(&query.topic)?;
    let topic_ip = state.store.topic_ip(&query.topic)?;
    Ok(Json(ConnInfoResponse {
        topic_ip,
        client_ip: client_ip(&headers, &connect_info),
    }))
}

/// Whether a browser session is currently polling the topic.
///
/// True iff the topic's heartbeat marker was refreshed within the active
/// window; the client bridge uses this to decide whether the approval page
/// must be opened again.
#[utoipa::path(
    get,
    path = "/v1/conn/active",
    tag = "Connection",
    params(TopicQuery),
    responses(
        (status = 200, description = "Heartbeat freshness", body = IsActiveResponse),
        (status = 400, description = "Structural validation failure")
    )
)]
pub async fn is_active(
    State(state): State<AppState>,
    Query(query): Query<TopicQuery>,
) -> Result<Json<IsActiveResponse>, ApiError> {
    validate_topic(&query.topic)?;
    Ok(Json(IsActiveResponse {
        active: state.store.is_active(&query.topic)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    const TOPIC: &str = "4303a429d2dc55bdfb688c34eb6482c251334a9180629ae981258bd10d98fee4";

    fn connect_info(addr: &str) -> ConnectInfo<SocketAddr> {
        ConnectInfo(addr.parse().expect("addr"))
    }

    #[tokio::test]
    async fn info_reports_both_ips() {
        let state = AppState::default();
        state
            .store
            .insert_message(TOPIC, "1", "signMessage", "00", "1.1.1.1")
            .expect("insert");

        let Json(info) = connection_info(
            State(state.clone()),
            connect_info("2.2.2.2:443"),
            HeaderMap::new(),
            Query(TopicQuery {
                topic: TOPIC.to_string(),
            }),
        )
        .await
        .expect("info");

        assert_eq!(info.topic_ip.as_deref(), Some("1.1.1.1"));
        assert_eq!(info.client_ip, "2.2.2.2");
    }

    #[tokio::test]
    async fn info_honors_forwarded_header() {
        let state = AppState::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("3.3.3.3"));

        let Json(info) = connection_info(
            State(state),
            connect_info("2.2.2.2:443"),
            headers,
            Query(TopicQuery {
                topic: TOPIC.to_string(),
            }),
        )
        .await
        .expect("info");

        assert_eq!(info.topic_ip, None);
        assert_eq!(info.client_ip, "3.3.3.3");
    }

    #[tokio::test]
    async fn active_follows_heartbeat() {
        let state = AppState::default();

        let Json(before) = is_active(
            State(state.clone()),
            Query(TopicQuery {
                topic: TOPIC.to_string(),
            }),
        )
        .await
        .expect("is_active");
        assert!(!before.active);

        state.store.touch_active(TOPIC).expect("touch");
        let Json(after) = is_active(
            State(state),
            Query(TopicQuery {
                topic: TOPIC.to_string(),
            }),
        )
        .await
        .expect("is_active");
        assert!(after.active);
    }

    #[tokio::test]
    async fn malformed_topic_is_rejected() {
        let state = AppState::default();
        let err = is_active(
            State(state),
            Query(TopicQuery {
                topic: "not-a-topic".to_string(),
            }),
        )
        .await
        .expect_err("validation");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
