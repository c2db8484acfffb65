//! Parameter checks run before any cryptographic primitive.
//!
//! Each check logs a diagnostic naming the offending field and the allowed
//! set. [`validate_all`] runs every check so that all problems are reported,
//! then fails with the first one.

use tracing::warn;

use crate::config::{
    ALLOWED_KEYLENS, Digest, Encoding, MIN_ITERATIONS, MIN_PASSWORD_LEN, join_names,
};
use crate::error::{Field, ValidationError};

/// One request parameter to check.
#[derive(Debug, Clone, Copy)]
pub enum Param<'a> {
    Hash(&'a str),
    Password(&'a str),
    SaltPassword(&'a str),
    Keylen(usize),
    Key(&'a [u8]),
    Encoding(&'a str),
    Iterations(i64),
}

impl Param<'_> {
    pub fn field(&self) -> Field {
        match self {
            Param::Hash(_) => Field::Hash,
            Param::Password(_) => Field::Password,
            Param::SaltPassword(_) => Field::SaltPassword,
            Param::Keylen(_) => Field::Keylen,
            Param::Key(_) => Field::Key,
            Param::Encoding(_) => Field::Encoding,
            Param::Iterations(_) => Field::Iterations,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let field = self.field();
        let reason = match *self {
            Param::Hash(hash) => check_hash(hash),
            Param::Password(pw) | Param::SaltPassword(pw) => check_password(pw),
            Param::Keylen(keylen) => check_keylen(keylen),
            Param::Key(key) => check_key(key),
            Param::Encoding(encoding) => check_encoding(encoding),
            Param::Iterations(iterations) => check_iterations(iterations),
        };

        match reason {
            None => Ok(()),
            Some(reason) => {
                warn!(field = field.name(), "{reason}");
                Err(ValidationError::new(field, reason))
            }
        }
    }
}

/// Checks every parameter and fails if any of them is invalid.
pub fn validate_all(params: &[Param<'_>]) -> Result<(), ValidationError> {
    let mut first = None;
    for param in params {
        if let Err(e) = param.validate() {
            first.get_or_insert(e);
        }
    }
    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn check_hash(hash: &str) -> Option<String> {
    let allowed = join_names(Digest::ALLOWED);
    if hash.is_empty() {
        Some(format!("a hash must be chosen between {allowed}"))
    } else if Digest::from_name(hash).is_none() {
        Some(format!("algorithm \"{hash}\" is not supported: {allowed}"))
    } else {
        None
    }
}

fn check_password(password: &str) -> Option<String> {
    if password.is_empty() {
        Some("a password must be chosen".to_string())
    } else if password.trim().chars().count() < MIN_PASSWORD_LEN {
        Some(format!("must be at least {MIN_PASSWORD_LEN} characters"))
    } else {
        None
    }
}

fn check_keylen(keylen: usize) -> Option<String> {
    if ALLOWED_KEYLENS.contains(&keylen) {
        None
    } else {
        Some(format!(
            "key length {keylen} is not supported: {}",
            join_names(ALLOWED_KEYLENS)
        ))
    }
}

fn check_key(key: &[u8]) -> Option<String> {
    if key.is_empty() {
        Some("a key must be generated with `crypte genkey`".to_string())
    } else if !ALLOWED_KEYLENS.contains(&key.len()) {
        Some(format!(
            "key of {} bytes must be of length: {} bytes",
            key.len(),
            join_names(ALLOWED_KEYLENS)
        ))
    } else {
        None
    }
}

fn check_encoding(encoding: &str) -> Option<String> {
    let allowed = join_names(Encoding::ALLOWED);
    if encoding.is_empty() {
        Some(format!("an encoding must be chosen between {allowed}"))
    } else if Encoding::from_name(encoding).is_none() {
        Some(format!("format \"{encoding}\" is not supported: {allowed}"))
    } else {
        None
    }
}

fn check_iterations(iterations: i64) -> Option<String> {
    if iterations < i64::from(MIN_ITERATIONS) {
        Some(format!(
            "{iterations} iterations is too small and not safe, minimum is {MIN_ITERATIONS}"
        ))
    } else if u32::try_from(iterations).is_err() {
        Some(format!("{iterations} iterations is too large, maximum is {}", u32::MAX))
    } else {
        None
    }
}
