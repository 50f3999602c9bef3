// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Symmetric encryption envelope for relay traffic.
//!
//! Both sides of a bridge share a 256-bit secret and never anything else.
//! Payloads are sealed with AES-256-GCM; a fresh random 12-byte nonce is
//! generated per call and prepended to the ciphertext, so no nonce state is
//! shared. The wire format is lowercase hex: `hex(nonce) || hex(ciphertext)`.
//!
//! The rendezvous topic is derived from the secret with SHA-256, so either
//! holder can compute the mailbox address independently. The hash is taken
//! over the secret's hex form, which is the only representation that ever
//! crosses a process boundary (inside the browser approval URL).

use std::fmt;

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};

/// Secret length in bytes (AES-256 key).
pub const SECRET_LEN: usize = 32;

/// Topic length in characters (hex-encoded SHA-256 digest).
pub const TOPIC_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("system RNG failure")]
    Rng,

    #[error("secret must be {SECRET_LEN} bytes ({} hex chars)", SECRET_LEN * 2)]
    BadSecretLength,

    #[error("ciphertext is not valid hex")]
    MalformedHex,

    #[error("ciphertext too short to contain a nonce and tag")]
    TooShort,

    #[error("encryption failure")]
    Encrypt,

    /// Authentication failed: wrong key, corrupted record, or a message that
    /// was never addressed to this party. Callers must treat this as "ignore
    /// this record", not as an application error.
    #[error("decryption failure")]
    Decrypt,

    #[error("decrypted payload is not valid UTF-8")]
    Utf8,
}

// =============================================================================
// Secret
// =============================================================================

/// A 256-bit bridge secret.
///
/// Generated once per client bridge instance and held only in process memory
/// (or the browser's persistent local state on the approving side). The
/// `Debug` impl is redacted so the secret never leaks into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    /// Generate a fresh random secret.
    pub fn generate() -> Result<Self, EnvelopeError> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; SECRET_LEN];
        rng.fill(&mut bytes).map_err(|_| EnvelopeError::Rng)?;
        Ok(Secret(bytes))
    }

    /// Parse a secret from its 64-char hex form.
    pub fn from_hex(s: &str) -> Result<Self, EnvelopeError> {
        let bytes = hex::decode(s).map_err(|_| EnvelopeError::MalformedHex)?;
        let bytes: [u8; SECRET_LEN] = bytes
            .try_into()
            .map_err(|_| EnvelopeError::BadSecretLength)?;
        Ok(Secret(bytes))
    }

    /// Hex form of the secret. This is the representation embedded in the
    /// browser approval URL and hashed for topic derivation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Derive the rendezvous topic: lowercase hex SHA-256 of the hex secret.
    ///
    /// Deterministic and side-effect-free, so both parties compute the same
    /// topic without exchanging it. Preimage resistance of SHA-256 keeps the
    /// topic unguessable without the secret.
    pub fn topic(&self) -> String {
        let d = digest(&SHA256, self.to_hex().as_bytes());
        hex::encode(d.as_ref())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Check that a string is structurally a topic: exactly 64 lowercase hex chars.
pub fn is_topic(s: &str) -> bool {
    s.len() == TOPIC_LEN
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

// =============================================================================
// Seal / Open
// =============================================================================

fn aead_key(secret: &Secret) -> Result<LessSafeKey, EnvelopeError> {
    let unbound =
        UnboundKey::new(&AES_256_GCM, &secret.0).map_err(|_| EnvelopeError::BadSecretLength)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt a plaintext under the shared secret.
///
/// Returns `hex(nonce) || hex(ciphertext || tag)`.
pub fn encrypt(plaintext: &str, secret: &Secret) -> Result<String, EnvelopeError> {
    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| EnvelopeError::Rng)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let key = aead_key(secret)?;
    let mut in_out = plaintext.as_bytes().to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| EnvelopeError::Encrypt)?;

    Ok(format!("{}{}", hex::encode(nonce_bytes), hex::encode(in_out)))
}

/// Decrypt a nonce-prefixed hex ciphertext under the shared secret.
///
/// Fails with [`EnvelopeError::Decrypt`] on any tampering of nonce, key,
/// ciphertext, or tag.
pub fn decrypt(ciphertext_hex: &str, secret: &Secret) -> Result<String, EnvelopeError> {
    let raw = hex::decode(ciphertext_hex).map_err(|_| EnvelopeError::MalformedHex)?;
    if raw.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(EnvelopeError::TooShort);
    }

    let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| EnvelopeError::Decrypt)?;

    let key = aead_key(secret)?;
    let mut in_out = sealed.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| EnvelopeError::Decrypt)?;

    String::from_utf8(plaintext.to_vec()).map_err(|_| EnvelopeError::Utf8)
}
