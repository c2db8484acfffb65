//! Cryptographic primitives.
//!
//! Provides PBKDF2 key derivation, AES-256-GCM with detached tags and the
//! timing equalization step.

pub mod aead;
pub mod kdf;
pub mod timing;

pub use aead::{decrypt, encrypt, random_bytes};
pub use kdf::{
    DerivedKey, KeyRequest, derive_key, derive_key_async, derive_key_with_salt,
    derive_key_with_salt_async, generate_salt,
};
pub use timing::equalize_timing;

/// Length of the random salt input (32 bytes).
pub const SALT_LEN: usize = 32;
/// Length of the GCM authentication tag (16 bytes).
pub const TAG_LEN: usize = 16;
/// Length of the derived IV (16 bytes).
pub const IV_LEN: usize = crate::config::IV_KEYLEN;
/// Length of the random padding appended to packed ciphertexts (12 bytes).
pub const PADDING_LEN: usize = 12;
