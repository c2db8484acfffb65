use std::fmt;

use thiserror::Error;

/// Result type for crypte operations.
pub type Result<T> = std::result::Result<T, CrypteError>;

/// Everything a derivation, cipher or guard call can fail with.
#[derive(Debug, Error)]
pub enum CrypteError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("encryption failed")]
    Encryption,

    #[error("authentication failed: ciphertext or tag does not verify")]
    Authentication,

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("OS random generator unavailable")]
    Random,

    #[error("decrypted content is not valid UTF-8")]
    Utf8,

    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Parameter a validation check applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Hash,
    Password,
    SaltPassword,
    Keylen,
    Key,
    Encoding,
    Iterations,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Hash => "hash",
            Field::Password => "password",
            Field::SaltPassword => "salt password",
            Field::Keylen => "key length",
            Field::Key => "key",
            Field::Encoding => "encoding",
            Field::Iterations => "iterations",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A request parameter outside its allowed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: Field, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A packed ciphertext that cannot be split into tag, content and IV.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("packed ciphertext must contain exactly one {0} delimiter")]
    Delimiter(&'static str),

    #[error("packed ciphertext {0} segment is not valid hex")]
    Hex(&'static str),

    #[error("packed ciphertext {segment} must be {expected} bytes, got {actual}")]
    Length {
        segment: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// One reason the crypting environment is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvProblem {
    #[error("required variable {0} is not set")]
    Missing(&'static str),

    #[error("{var} must be a {expected}-byte key, got {actual} bytes")]
    KeyLength {
        var: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("cipher {0} is not supported")]
    Cipher(String),

    #[error("delimiter {var} {reason}")]
    Delimiter { var: &'static str, reason: &'static str },
}

/// Fatal: the process must not start encrypting with this environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("security warning: crypting environment unset ({})", crate::config::join_names(.problems))]
pub struct ConfigError {
    pub problems: Vec<EnvProblem>,
}
