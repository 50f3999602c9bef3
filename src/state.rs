// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::store::{MemoryStore, RelayStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RelayStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn RelayStore>) -> Self {
        Self { store }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}
