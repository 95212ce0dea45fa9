//! AES-256-GCM-SIV encryption and decryption of individual credential strings.
//!
//! The AEAD tag means any bit of corruption, truncation, or a wrong key makes
//! decryption fail outright — a stored blob can never silently decode into
//! garbage plaintext.

use aes_gcm_siv::{
    aead::{Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The master key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// Refusing to encrypt an empty plaintext.
    #[error("plaintext must not be empty")]
    EmptyPlaintext,

    /// Refusing to decrypt an empty blob.
    #[error("encrypted input must not be empty")]
    EmptyInput,

    /// The blob is not valid base64.
    #[error("encrypted blob is not valid base64")]
    InvalidEncoding,

    /// The decoded blob is shorter than a nonce — it cannot have been
    /// produced by [`encrypt`].
    #[error("encrypted blob shorter than the {NONCE_LEN}-byte nonce")]
    TruncatedBlob,

    /// AEAD operation failed: wrong key, tampered or truncated ciphertext.
    #[error("aead operation failed")]
    AeadFailure,
}

/// Encrypt a credential using AES-256-GCM-SIV under `key`.
///
/// A fresh 96-bit nonce is generated per call via the OS CSPRNG and prepended
/// to the ciphertext, so two encryptions of the same plaintext produce
/// unrelated blobs. The result is a single base64 string suitable for opaque
/// storage.
///
/// # Errors
///
/// Returns [`CipherError::EmptyPlaintext`] for empty input and
/// [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// [`CipherError::AeadFailure`] covers an internal AEAD error (unreachable
/// with a valid key and nonce).
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String, CipherError> {
    if plaintext.is_empty() {
        return Err(CipherError::EmptyPlaintext);
    }
    let cipher = build_cipher(key)?;

    // OsRng for a cryptographically secure random nonce, never reused.
    use aes_gcm_siv::aead::rand_core::RngCore;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::AeadFailure)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(blob))
}

/// Decrypt a blob produced by [`encrypt`] back to plaintext bytes.
///
/// # Errors
///
/// Fails closed on every malformed input: [`CipherError::EmptyInput`],
/// [`CipherError::InvalidEncoding`] for bad base64,
/// [`CipherError::TruncatedBlob`] when the decoded bytes cannot even hold a
/// nonce, and [`CipherError::AeadFailure`] when authentication fails (wrong
/// key or tampered data).
pub fn decrypt(blob: &str, key: &[u8]) -> Result<Vec<u8>, CipherError> {
    if blob.is_empty() {
        return Err(CipherError::EmptyInput);
    }
    let cipher = build_cipher(key)?;

    let decoded = STANDARD
        .decode(blob)
        .map_err(|_| CipherError::InvalidEncoding)?;
    if decoded.len() < NONCE_LEN {
        return Err(CipherError::TruncatedBlob);
    }
    let (nonce_bytes, ciphertext) = decoded.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CipherError::AeadFailure)
}

fn build_cipher(key: &[u8]) -> Result<Aes256GcmSiv, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}
