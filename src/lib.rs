// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bridge Relay - Encrypted Wallet Bridge over a Topic Relay
//!
//! This crate connects an offline agent process to a browser wallet session
//! through an untrusted relay server. All payloads cross the relay as
//! AES-256-GCM envelopes addressed by a topic derived from a shared secret;
//! the relay stores and forwards ciphertext it cannot read.
//!
//! ## Modules
//!
//! - `api` - Relay HTTP handlers (Axum)
//! - `bridge` - Browser-side session: polling, classification, dispatch
//! - `client` - Offline-side bridge: encrypt, post, wait
//! - `envelope` - Secrets, topics, and the AES-256-GCM wire format
//! - `rpc` - Typed HTTP client for the relay endpoints
//! - `store` - Message store backends (in-memory and redb)

pub mod api;
pub mod bridge;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod models;
pub mod rpc;
pub mod state;
pub mod store;
