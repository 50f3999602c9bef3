// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BRIDGE_RELAY_URL` | Relay base URL used by both bridge sides | `http://127.0.0.1:8080` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `RELAY_DB_PATH` | Path to the redb store; unset selects in-memory | Unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

/// Environment variable name for the relay base URL.
///
/// Consumed by the client bridge and the browser-bridge session; the server
/// itself only uses `HOST`/`PORT`.
pub const RELAY_URL_ENV: &str = "BRIDGE_RELAY_URL";

/// Default relay base URL for local development.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8080";

/// Environment variable name for the server bind host.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the server bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the redb store path.
///
/// When set, the server persists messages and markers at this path; when
/// unset it falls back to the in-memory backend (all state lost on restart,
/// acceptable for development).
pub const DB_PATH_ENV: &str = "RELAY_DB_PATH";

/// Environment variable name selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Resolve the relay base URL from the environment.
pub fn relay_url() -> String {
    std::env::var(RELAY_URL_ENV).unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string())
}
