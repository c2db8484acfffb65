//! Decoy work run before each encryption.
//!
//! An HMAC over a random-length buffer with a randomly chosen digest blurs
//! the wall-clock difference between short and long inputs.

use std::hint::black_box;

use super::aead::{random_bytes, secure_random};
use super::kdf::hmac;
use crate::config::Digest;
use crate::error::Result;

const DECOY_LENGTHS: [usize; 7] = [8, 16, 32, 64, 128, 256, 512];

pub fn equalize_timing() -> Result<()> {
    let mut picks = [0u8; 2];
    secure_random(&mut picks)?;

    let len = DECOY_LENGTHS[usize::from(picks[0]) % DECOY_LENGTHS.len()];
    let digest = Digest::ALLOWED[usize::from(picks[1]) % Digest::ALLOWED.len()];

    let data = random_bytes(len)?;
    let key = hex::encode(random_bytes(16)?);

    black_box(hmac(digest, key.as_bytes(), &data)?);
    Ok(())
}
