//! Packed ciphertext format.
//!
//! A packed ciphertext is one string, stored as-is in a text column:
//!
//! ```text
//! hex(TAG) PEPPER hex(CIPHERTEXT) CHILLI hex(IV) OIGNON hex(PADDING)
//! ```
//!
//! The padding is random noise that is written but never read. The layout is
//! persisted and must stay stable.

use crate::config::{DEFAULT_CHILLI, DEFAULT_OIGNON, DEFAULT_PEPPER};
use crate::crypto::{IV_LEN, TAG_LEN};
use crate::error::{EnvProblem, FormatError};

pub mod spiced;

/// The three tokens joining packed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pepper: String,
    chilli: String,
    oignon: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new(DEFAULT_PEPPER, DEFAULT_CHILLI, DEFAULT_OIGNON)
    }
}

impl Delimiters {
    pub fn new(
        pepper: impl Into<String>,
        chilli: impl Into<String>,
        oignon: impl Into<String>,
    ) -> Self {
        Self {
            pepper: pepper.into(),
            chilli: chilli.into(),
            oignon: oignon.into(),
        }
    }

    pub fn pepper(&self) -> &str {
        &self.pepper
    }

    pub fn chilli(&self) -> &str {
        &self.chilli
    }

    pub fn oignon(&self) -> &str {
        &self.oignon
    }

    /// Reasons these tokens cannot safely delimit hex fields.
    ///
    /// A token that starts and ends with a non-hex character, whose interior
    /// holds none of the boundary characters of any token and at least one
    /// non-hex character, can only match where it was written. Any other
    /// match would have to start or end inside a hex field, or straddle a
    /// hex field between two boundary characters.
    pub(crate) fn problems(&self) -> Vec<EnvProblem> {
        let named = [
            ("PEPPER_KEY", self.pepper.as_str()),
            ("CHILLI_KEY", self.chilli.as_str()),
            ("OIGNON_KEY", self.oignon.as_str()),
        ];
        let boundaries: Vec<char> = named
            .iter()
            .flat_map(|&(_, token)| token.chars().next().into_iter().chain(token.chars().last()))
            .collect();

        let mut problems = Vec::new();
        for (i, (var, token)) in named.into_iter().enumerate() {
            let interior = interior(token);
            let reason = if token.is_empty() {
                Some("must not be empty")
            } else if token.chars().all(|c| c.is_ascii_hexdigit()) {
                Some("must contain a non-hex character")
            } else if !starts_and_ends_non_hex(token) {
                Some("must start and end with a non-hex character")
            } else if named
                .iter()
                .enumerate()
                .any(|(j, (_, other))| i != j && !other.is_empty() && other.contains(token))
            {
                Some("must not appear inside another delimiter")
            } else if interior.chars().any(|c| boundaries.contains(&c)) {
                Some("must not repeat a first or last delimiter character inside")
            } else if interior.chars().all(|c| c.is_ascii_hexdigit()) {
                Some("must contain a non-hex character between its ends")
            } else {
                None
            };
            if let Some(reason) = reason {
                problems.push(EnvProblem::Delimiter { var, reason });
            }
        }
        problems
    }
}

fn starts_and_ends_non_hex(token: &str) -> bool {
    let non_hex = |c: char| !c.is_ascii_hexdigit();
    token.chars().next().is_some_and(non_hex) && token.chars().last().is_some_and(non_hex)
}

fn interior(token: &str) -> &str {
    let mut chars = token.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

/// The binary fields carried by a packed ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedCiphertext {
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LEN],
}

impl PackedCiphertext {
    /// Joins the fields and the padding noise into one string.
    pub fn pack(&self, delimiters: &Delimiters, padding: &[u8]) -> String {
        spiced::join(
            delimiters,
            &hex::encode(self.tag),
            &hex::encode(&self.ciphertext),
            &hex::encode(self.iv),
            &hex::encode(padding),
        )
    }

    /// Parses a packed string. Any wrong delimiter count, bad hex or wrong
    /// field length rejects the whole string.
    pub fn unpack(packed: &str, delimiters: &Delimiters) -> Result<Self, FormatError> {
        let segments = spiced::split(packed, delimiters)?;

        let tag = decode_fixed::<TAG_LEN>(segments.tag, "tag")?;
        let ciphertext =
            hex::decode(segments.content).map_err(|_| FormatError::Hex("ciphertext"))?;
        let iv = decode_fixed::<IV_LEN>(segments.iv, "iv")?;

        Ok(Self {
            tag,
            ciphertext,
            iv,
        })
    }
}

fn decode_fixed<const N: usize>(
    segment: &str,
    name: &'static str,
) -> Result<[u8; N], FormatError> {
    let bytes = hex::decode(segment).map_err(|_| FormatError::Hex(name))?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| FormatError::Length {
        segment: name,
        expected: N,
        actual,
    })
}
