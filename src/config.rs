//! Allowed algorithm sets and defaults.
//!
//! These never change at runtime. A parameter outside a set is a validation
//! failure, never coerced to a default.

use std::fmt;

/// Allowed derived key lengths in bytes (128, 192 and 256 bits).
pub const ALLOWED_KEYLENS: [usize; 3] = [16, 24, 32];
/// Lowest accepted PBKDF2 iteration count.
pub const MIN_ITERATIONS: u32 = 10;
/// Iteration count used when none is given.
pub const DEFAULT_ITERATIONS: u32 = 100_000;
/// Derived key length used when none is given.
pub const DEFAULT_KEYLEN: usize = 32;
/// Shortest accepted password, counted after trimming.
pub const MIN_PASSWORD_LEN: usize = 5;

/// The single supported cipher.
pub const CIPHER_ALGORITHM: &str = "aes-256-gcm";
/// Cipher key length in bytes for [`CIPHER_ALGORITHM`].
pub const CIPHER_KEYLEN: usize = 32;
/// Length of the derived IV in bytes.
pub const IV_KEYLEN: usize = 16;

pub const DEFAULT_SALT_HASH: Digest = Digest::Sha512;
pub const DEFAULT_DIGEST: Digest = Digest::Sha512;
pub const DEFAULT_ENCODING: Encoding = Encoding::Binary;

pub const DEFAULT_PEPPER: &str = "-pepper-";
pub const DEFAULT_CHILLI: &str = "-chilli-";
pub const DEFAULT_OIGNON: &str = "-oignon-";

/// Hash functions accepted for salt HMAC and PBKDF2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Digest {
    Sha256,
    Sha384,
    Sha512,
}

impl Digest {
    pub const ALLOWED: [Digest; 3] = [Digest::Sha256, Digest::Sha384, Digest::Sha512];

    pub fn name(&self) -> &'static str {
        match self {
            Digest::Sha256 => "sha256",
            Digest::Sha384 => "sha384",
            Digest::Sha512 => "sha512",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALLOWED.into_iter().find(|d| d.name() == name)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output encodings for derived keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Binary,
    Hex,
    Base64,
}

impl Encoding {
    pub const ALLOWED: [Encoding; 3] = [Encoding::Binary, Encoding::Hex, Encoding::Base64];

    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Binary => "binary",
            Encoding::Hex => "hex",
            Encoding::Base64 => "base64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALLOWED.into_iter().find(|e| e.name() == name)
    }

    /// Bits of key material carried by one output unit.
    pub fn bits_per_unit(&self) -> usize {
        match self {
            Encoding::Binary => 8,
            Encoding::Hex => 4,
            Encoding::Base64 => 6,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joins names for diagnostics, e.g. `sha256, sha384, sha512`.
pub(crate) fn join_names<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_names_round_trip() {
        for d in Digest::ALLOWED {
            assert_eq!(Digest::from_name(d.name()), Some(d));
        }
        assert_eq!(Digest::from_name("sha1"), None);
        assert_eq!(Digest::from_name("SHA256"), None);
    }

    #[test]
    fn encoding_names_round_trip() {
        for e in Encoding::ALLOWED {
            assert_eq!(Encoding::from_name(e.name()), Some(e));
        }
        assert_eq!(Encoding::from_name("utf8"), None);
    }

    #[test]
    fn join_names_formats_allowed_sets() {
        assert_eq!(join_names(Digest::ALLOWED), "sha256, sha384, sha512");
        assert_eq!(join_names(ALLOWED_KEYLENS), "16, 24, 32");
    }
}
