//! Process-wide secret material and its startup guard.
//!
//! A [`CryptingEnvironment`] is read once, never mutated, and handed to
//! [`crate::Crypte`] which refuses to start unless [`CryptingEnvironment::check`]
//! passes.

use std::fmt;
use std::sync::OnceLock;

use tracing::{debug, error, warn};
use zeroize::Zeroizing;

use crate::config::{
    CIPHER_ALGORITHM, CIPHER_KEYLEN, DEFAULT_DIGEST, DEFAULT_ITERATIONS, DEFAULT_SALT_HASH,
    IV_KEYLEN,
};
use crate::crypto::KeyRequest;
use crate::error::{ConfigError, EnvProblem};
use crate::format::Delimiters;

pub const SALT_PASS: &str = "SALT_PASS";
pub const SALT_ALGO: &str = "SALT_ALGO";
pub const IV_PASS: &str = "IV_PASS";
pub const IV_ITERATIONS: &str = "IV_ITERATIONS";
pub const IV_DIGEST: &str = "IV_DIGEST";
pub const CIPHER_KEY: &str = "CIPHER_KEY";
pub const PEPPER_KEY: &str = "PEPPER_KEY";
pub const CHILLI_KEY: &str = "CHILLI_KEY";
pub const OIGNON_KEY: &str = "OIGNON_KEY";

pub struct CryptingEnvironment {
    salt_password: Option<Zeroizing<String>>,
    salt_hash: String,
    iv_password: Option<Zeroizing<String>>,
    iv_iterations: i64,
    iv_keylen: usize,
    iv_digest: String,
    cipher_algorithm: String,
    cipher_key: Option<Zeroizing<Vec<u8>>>,
    delimiters: Delimiters,
    verdict: OnceLock<Result<(), ConfigError>>,
}

impl CryptingEnvironment {
    /// Reads the environment from process variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the environment through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let iv_iterations = match var(IV_ITERATIONS).as_deref().and_then(leading_integer) {
            Some(n) if n != 0 => n,
            Some(_) => DEFAULT_ITERATIONS.into(),
            None => {
                if let Some(raw) = var(IV_ITERATIONS) {
                    warn!("{IV_ITERATIONS}={raw:?} is not a number, using {DEFAULT_ITERATIONS}");
                }
                DEFAULT_ITERATIONS.into()
            }
        };

        let defaults = Delimiters::default();
        let delimiters = Delimiters::new(
            var(PEPPER_KEY).unwrap_or_else(|| defaults.pepper().to_string()),
            var(CHILLI_KEY).unwrap_or_else(|| defaults.chilli().to_string()),
            var(OIGNON_KEY).unwrap_or_else(|| defaults.oignon().to_string()),
        );

        Self {
            salt_password: var(SALT_PASS).map(Zeroizing::new),
            salt_hash: var(SALT_ALGO).unwrap_or_else(|| DEFAULT_SALT_HASH.name().to_string()),
            iv_password: var(IV_PASS).map(Zeroizing::new),
            iv_iterations,
            iv_keylen: IV_KEYLEN,
            iv_digest: var(IV_DIGEST).unwrap_or_else(|| DEFAULT_DIGEST.name().to_string()),
            cipher_algorithm: CIPHER_ALGORITHM.to_string(),
            cipher_key: var(CIPHER_KEY).map(|k| Zeroizing::new(k.into_bytes())),
            delimiters,
            verdict: OnceLock::new(),
        }
    }

    /// Verifies the secret material.
    ///
    /// The first call inspects and logs every problem. Later calls only log
    /// and return the same outcome.
    pub fn check(&self) -> Result<(), ConfigError> {
        let mut first = false;
        let verdict = self.verdict.get_or_init(|| {
            first = true;
            self.inspect()
        });
        if !first {
            debug!(secure = verdict.is_ok(), "crypting environment already checked");
        }
        verdict.clone()
    }

    fn inspect(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.salt_password.is_none() {
            problems.push(EnvProblem::Missing(SALT_PASS));
        }
        if self.iv_password.is_none() {
            problems.push(EnvProblem::Missing(IV_PASS));
        }
        match &self.cipher_key {
            None => problems.push(EnvProblem::Missing(CIPHER_KEY)),
            Some(key) if key.len() != CIPHER_KEYLEN => problems.push(EnvProblem::KeyLength {
                var: CIPHER_KEY,
                expected: CIPHER_KEYLEN,
                actual: key.len(),
            }),
            Some(_) => {}
        }
        if self.cipher_algorithm != CIPHER_ALGORITHM {
            problems.push(EnvProblem::Cipher(self.cipher_algorithm.clone()));
        }
        problems.extend(self.delimiters.problems());

        if problems.is_empty() {
            debug!("crypting environment set and secure");
            Ok(())
        } else {
            for problem in &problems {
                error!("{problem}");
            }
            Err(ConfigError { problems })
        }
    }

    pub fn salt_hash(&self) -> &str {
        &self.salt_hash
    }

    /// As configured. Counts below the minimum are rejected when an IV is derived.
    pub fn iv_iterations(&self) -> i64 {
        self.iv_iterations
    }

    pub fn iv_keylen(&self) -> usize {
        self.iv_keylen
    }

    pub fn iv_digest(&self) -> &str {
        &self.iv_digest
    }

    pub fn cipher_algorithm(&self) -> &str {
        &self.cipher_algorithm
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Derivation request for a fresh per-call IV.
    pub(crate) fn iv_request(&self) -> Result<KeyRequest, ConfigError> {
        let iv_password = self.iv_password.as_ref().ok_or_else(|| missing(IV_PASS))?;
        let salt_password = self
            .salt_password
            .as_ref()
            .ok_or_else(|| missing(SALT_PASS))?;

        Ok(KeyRequest::new(iv_password.as_str())
            .iterations(self.iv_iterations)
            .keylen(self.iv_keylen)
            .digest(self.iv_digest.as_str())
            .encoding("binary")
            .salt_password(salt_password.as_str())
            .salt_hash(self.salt_hash.as_str()))
    }

    pub(crate) fn cipher_key(&self) -> Result<&[u8], ConfigError> {
        self.cipher_key
            .as_deref()
            .map(Vec::as_slice)
            .ok_or_else(|| missing(CIPHER_KEY))
    }
}

/// Integer prefix of `raw`, so `"-5"` reads as -5 and `"5.5"` as 5.
fn leading_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let n: i64 = digits[..end].parse().ok()?;
    Some(if negative { -n } else { n })
}

fn missing(var: &'static str) -> ConfigError {
    ConfigError {
        problems: vec![EnvProblem::Missing(var)],
    }
}

impl fmt::Debug for CryptingEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |set: bool| if set { "<set>" } else { "<unset>" };
        f.debug_struct("CryptingEnvironment")
            .field("salt_password", &redact(self.salt_password.is_some()))
            .field("salt_hash", &self.salt_hash)
            .field("iv_password", &redact(self.iv_password.is_some()))
            .field("iv_iterations", &self.iv_iterations)
            .field("iv_keylen", &self.iv_keylen)
            .field("iv_digest", &self.iv_digest)
            .field("cipher_algorithm", &self.cipher_algorithm)
            .field("cipher_key", &redact(self.cipher_key.is_some()))
            .field("delimiters", &self.delimiters)
            .finish()
    }
}
