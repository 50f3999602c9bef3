// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static read/write classification of wallet methods.
//!
//! Write methods change wallet or chain state (signing, sending, permission
//! grants) and must wait for explicit user confirmation; read methods are
//! dispatched immediately. Classification fails closed: a method on neither
//! list is treated as a write.

use crate::models::Network;

/// How a decrypted request is handled by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Dispatched to the adapter without user interaction.
    Read,
    /// Queued for explicit user confirmation before dispatch.
    Write,
}

/// EVM methods that mutate wallet or chain state (EIP-1193 surface).
pub const EVM_WRITE_METHODS: &[&str] = &[
    "eth_sendTransaction",
    "eth_sendRawTransaction",
    "eth_sign",
    "eth_signTransaction",
    "eth_signTypedData_v4",
    "personal_sign",
    "wallet_addEthereumChain",
    "wallet_grantPermissions",
    "wallet_requestPermissions",
    "wallet_revokePermissions",
    "wallet_sendCalls",
    "wallet_sendTransaction",
    "wallet_switchEthereumChain",
    "wallet_watchAsset",
];

/// EVM methods that are pure queries.
pub const EVM_READ_METHODS: &[&str] = &[
    "eth_accounts",
    "eth_blockNumber",
    "eth_call",
    "eth_chainId",
    "eth_estimateGas",
    "eth_gasPrice",
    "eth_getBalance",
    "eth_getCode",
    "eth_getTransactionByHash",
    "eth_getTransactionReceipt",
    "net_version",
];

/// Solana wallet-standard methods that produce signatures.
pub const SVM_WRITE_METHODS: &[&str] = &["signMessage", "signTransaction", "signAllTransactions"];

/// Solana session methods that never sign anything.
pub const SVM_READ_METHODS: &[&str] = &["connect", "disconnect", "getAccount"];

/// Classify a `(network, method)` pair.
///
/// Tron has no read surface on this bridge, and unknown methods on any
/// network classify as writes.
pub fn classify(network: Network, method: &str) -> MessageKind {
    let (writes, reads): (&[&str], &[&str]) = match network {
        Network::Evm => (EVM_WRITE_METHODS, EVM_READ_METHODS),
        Network::Svm => (SVM_WRITE_METHODS, SVM_READ_METHODS),
        Network::Tvm => (&[], &[]),
    };
    if writes.contains(&method) {
        MessageKind::Write
    } else if reads.contains(&method) {
        MessageKind::Read
    } else {
        MessageKind::Write
    }
}
