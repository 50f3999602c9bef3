// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Browser-side bridge: wallet adapters, method classification, and the
//! per-page session that polls approved topics and dispatches requests.

pub mod adapters;
pub mod methods;
pub mod session;

pub use adapters::{AdapterError, AdapterSet, WalletAdapter};
pub use methods::{classify, MessageKind};
pub use session::{BridgeSession, LoggedMessage, PendingRequest};
