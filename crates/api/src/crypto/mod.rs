//! AES-256-GCM-SIV credential encryption primitives.
//!
//! This module is intentionally free of HTTP and storage dependencies.
//! It provides the low-level encrypt/decrypt operations used wherever a
//! user credential crosses the storage boundary.
//!
//! # Blob format
//!
//! ```text
//! base64(nonce || ciphertext+tag)
//! ```
//!
//! The nonce is prepended so every blob is self-contained: no separate nonce
//! storage channel, and any stored value can be decrypted knowing only the
//! master key.

pub mod cipher;

pub use cipher::KEY_LEN;
