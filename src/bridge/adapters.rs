// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet adapter seam.
//!
//! The session never talks to a wallet directly; it selects an adapter by
//! [`Network`] and hands over `(chain_id, method, params)`. Concrete
//! adapters wrap whatever wallet surface the host page exposes (an EIP-1193
//! provider, the Solana wallet standard, TronWeb) and live outside this
//! crate; the enum-keyed set makes adding a network a compile-time-checked
//! extension instead of a string-keyed lookup.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::Network;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The user declined in the wallet UI.
    #[error("{0}")]
    Rejected(String),

    /// The wallet failed to produce a result.
    #[error("wallet adapter failure: {0}")]
    Failed(String),

    /// The adapter does not implement this method.
    #[error("unsupported method: {0}")]
    Unsupported(String),
}

/// One network's wallet capability set.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Execute a wallet call and return its JSON result.
    async fn request(
        &self,
        chain_id: &str,
        method: &str,
        params: &Value,
    ) -> Result<Value, AdapterError>;
}

/// The session's adapter table, one entry per supported network.
#[derive(Clone)]
pub struct AdapterSet {
    evm: Arc<dyn WalletAdapter>,
    svm: Arc<dyn WalletAdapter>,
    tvm: Arc<dyn WalletAdapter>,
}

impl AdapterSet {
    pub fn new(
        evm: Arc<dyn WalletAdapter>,
        svm: Arc<dyn WalletAdapter>,
        tvm: Arc<dyn WalletAdapter>,
    ) -> Self {
        Self { evm, svm, tvm }
    }

    /// Same adapter for every network. Test and single-wallet convenience.
    pub fn uniform(adapter: Arc<dyn WalletAdapter>) -> Self {
        Self::new(adapter.clone(), adapter.clone(), adapter)
    }

    pub fn for_network(&self, network: Network) -> &Arc<dyn WalletAdapter> {
        match network {
            Network::Evm => &self.evm,
            Network::Svm => &self.svm,
            Network::Tvm => &self.tvm,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Scripted adapter: returns a fixed result (or rejection) and records
    /// every call it receives.
    pub struct ScriptedAdapter {
        outcome: Result<Value, String>,
        pub calls: Mutex<Vec<(String, String, Value)>>,
    }

    impl ScriptedAdapter {
        pub fn succeeding(result: Value) -> Self {
            Self {
                outcome: Ok(result),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn rejecting(reason: &str) -> Self {
            Self {
                outcome: Err(reason.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().expect("calls lock").len()
        }
    }

    #[async_trait]
    impl WalletAdapter for ScriptedAdapter {
        async fn request(
            &self,
            chain_id: &str,
            method: &str,
            params: &Value,
        ) -> Result<Value, AdapterError> {
            self.calls.lock().expect("calls lock").push((
                chain_id.to_string(),
                method.to_string(),
                params.clone(),
            ));
            match &self.outcome {
                Ok(value) => Ok(value.clone()),
                Err(reason) => Err(AdapterError::Rejected(reason.clone())),
            }
        }
    }
}
