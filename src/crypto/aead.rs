use aes_gcm::{
    AesGcm, Nonce, Tag,
    aead::{AeadInPlace, KeyInit, consts::U16},
    aes::Aes256,
};
use getrandom::fill;
use zeroize::Zeroizing;

use super::{IV_LEN, TAG_LEN};
use crate::error::{CrypteError, Field, FormatError, Result, ValidationError};

/// AES-256-GCM with a 128-bit IV.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Fill buffer with cryptographically secure random bytes
pub(crate) fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| CrypteError::Random)
}

/// Random bytes of the given length
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    secure_random(&mut buf)?;
    Ok(buf)
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm16> {
    Aes256Gcm16::new_from_slice(key).map_err(|_| {
        CrypteError::from(ValidationError::new(
            Field::Key,
            "cipher key must be 32 bytes for aes-256-gcm",
        ))
    })
}

fn check_iv(iv: &[u8]) -> Result<()> {
    if iv.len() != IV_LEN {
        return Err(FormatError::Length {
            segment: "iv",
            expected: IV_LEN,
            actual: iv.len(),
        }
        .into());
    }
    Ok(())
}

/// Encrypt plaintext, returning the ciphertext and its detached tag.
pub fn encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; TAG_LEN])> {
    check_iv(iv)?;
    let cipher = cipher(key)?;

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::<U16>::from_slice(iv), b"", &mut buffer)
        .map_err(|_| CrypteError::Encryption)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);
    Ok((buffer, tag_bytes))
}

/// Decrypt ciphertext after checking its tag.
pub fn decrypt(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Zeroizing<Vec<u8>>> {
    check_iv(iv)?;
    let cipher = cipher(key)?;

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::<U16>::from_slice(iv),
            b"",
            &mut buffer[..],
            Tag::<U16>::from_slice(tag),
        )
        .map_err(|_| CrypteError::Authentication)?;
    Ok(buffer)
}
