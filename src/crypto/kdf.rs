use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use zeroize::Zeroizing;

use super::SALT_LEN;
use super::aead::random_bytes;
use crate::config::{
    DEFAULT_DIGEST, DEFAULT_ENCODING, DEFAULT_ITERATIONS, DEFAULT_KEYLEN, DEFAULT_SALT_HASH,
    Digest, Encoding,
};
use crate::error::{CrypteError, Field, Result, ValidationError};
use crate::validate::{Param, validate_all};

macro_rules! hmac_with {
    ($hash:ty, $key:expr, $message:expr) => {{
        let mut mac = <Hmac<$hash> as Mac>::new_from_slice($key)
            .map_err(|e| CrypteError::Derivation(format!("invalid HMAC key: {e}")))?;
        mac.update($message);
        mac.finalize().into_bytes().to_vec()
    }};
}

/// HMAC of `message` under `key` with the given digest.
pub(crate) fn hmac(digest: Digest, key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    Ok(match digest {
        Digest::Sha256 => hmac_with!(Sha256, key, message),
        Digest::Sha384 => hmac_with!(Sha384, key, message),
        Digest::Sha512 => hmac_with!(Sha512, key, message),
    })
}

/// Parameters of one key derivation. Built per call and discarded.
#[derive(Clone)]
pub struct KeyRequest {
    password: Zeroizing<String>,
    salt_password: Option<Zeroizing<String>>,
    salt_hash: String,
    iterations: i64,
    keylen: usize,
    digest: String,
    encoding: String,
}

impl KeyRequest {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: Zeroizing::new(password.into()),
            salt_password: None,
            salt_hash: DEFAULT_SALT_HASH.name().to_string(),
            iterations: i64::from(DEFAULT_ITERATIONS),
            keylen: DEFAULT_KEYLEN,
            digest: DEFAULT_DIGEST.name().to_string(),
            encoding: DEFAULT_ENCODING.name().to_string(),
        }
    }

    /// Mixes a password into the fresh random salt through HMAC.
    pub fn salt_password(mut self, salt_password: impl Into<String>) -> Self {
        self.salt_password = Some(Zeroizing::new(salt_password.into()));
        self
    }

    pub fn salt_hash(mut self, salt_hash: impl Into<String>) -> Self {
        self.salt_hash = salt_hash.into();
        self
    }

    /// PBKDF2 rounds. Out of range counts are kept and rejected at derivation.
    pub fn iterations(mut self, iterations: impl Into<i64>) -> Self {
        self.iterations = iterations.into();
        self
    }

    pub fn keylen(mut self, keylen: usize) -> Self {
        self.keylen = keylen;
        self
    }

    pub fn digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = digest.into();
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    fn validate(&self) -> Result<Stretch> {
        let mut params = vec![
            Param::Password(self.password.as_str()),
            Param::Iterations(self.iterations),
            Param::Keylen(self.keylen),
            Param::Hash(&self.digest),
            Param::Encoding(&self.encoding),
        ];
        if let Some(salt_password) = &self.salt_password {
            params.push(Param::SaltPassword(salt_password.as_str()));
            params.push(Param::Hash(&self.salt_hash));
        }
        validate_all(&params)?;

        let digest = Digest::from_name(&self.digest)
            .ok_or_else(|| ValidationError::new(Field::Hash, "unsupported digest"))?;
        let encoding = Encoding::from_name(&self.encoding)
            .ok_or_else(|| ValidationError::new(Field::Encoding, "unsupported encoding"))?;
        let rounds = u32::try_from(self.iterations)
            .map_err(|_| ValidationError::new(Field::Iterations, "iteration count out of range"))?;
        Ok(Stretch {
            digest,
            encoding,
            rounds,
        })
    }

    fn salt_input(&self) -> Option<(Digest, &str)> {
        let salt_password = self.salt_password.as_ref()?;
        Digest::from_name(&self.salt_hash).map(|d| (d, salt_password.as_str()))
    }
}

/// Validated parameters handed to PBKDF2.
struct Stretch {
    digest: Digest,
    encoding: Encoding,
    rounds: u32,
}

impl fmt::Debug for KeyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRequest")
            .field("password", &"<redacted>")
            .field("salt_password", &self.salt_password.as_ref().map(|_| "<redacted>"))
            .field("salt_hash", &self.salt_hash)
            .field("iterations", &self.iterations)
            .field("keylen", &self.keylen)
            .field("digest", &self.digest)
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// Output of a key derivation.
///
/// Binary keys hold raw bytes. Hex and base64 keys hold the encoded text cut
/// to `keylen` characters, so a 32-byte hex key is 32 hex digits (128 bits).
/// Stored keys depend on that cut; it must not be changed.
pub struct DerivedKey {
    encoding: Encoding,
    data: Zeroizing<Vec<u8>>,
}

impl DerivedKey {
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The key text, for hex and base64 encodings.
    pub fn as_str(&self) -> Option<&str> {
        match self.encoding {
            Encoding::Binary => None,
            _ => std::str::from_utf8(&self.data).ok(),
        }
    }

    /// Length in output units (bytes or characters).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Key material carried by the output, in bits.
    pub fn bits(&self) -> usize {
        self.len() * self.encoding.bits_per_unit()
    }

    /// Printable form; binary keys are shown as hex.
    pub fn to_printable(&self) -> Zeroizing<String> {
        match self.as_str() {
            Some(text) => Zeroizing::new(text.to_string()),
            None => Zeroizing::new(hex::encode(self.as_bytes())),
        }
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("encoding", &self.encoding)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Generate a fresh salt.
///
/// Always starts from random bytes. With a salt password the bytes are passed
/// through `HMAC(hash, salt_password)`, which strengthens the salt but does not
/// make it reproducible.
pub fn generate_salt(salted: Option<(Digest, &str)>) -> Result<Zeroizing<Vec<u8>>> {
    let random = random_bytes(SALT_LEN)?;
    match salted {
        None => Ok(Zeroizing::new(random)),
        Some((hash, salt_password)) => Ok(Zeroizing::new(hmac(
            hash,
            salt_password.as_bytes(),
            &random,
        )?)),
    }
}

/// Derive a key with a freshly drawn salt.
pub fn derive_key(request: &KeyRequest) -> Result<DerivedKey> {
    let params = request.validate()?;
    let salt = generate_salt(request.salt_input())?;
    Ok(stretch(request, &salt, params))
}

/// Derive a key from an explicit salt. Same inputs, same output.
pub fn derive_key_with_salt(request: &KeyRequest, salt: &[u8]) -> Result<DerivedKey> {
    let params = request.validate()?;
    Ok(stretch(request, salt, params))
}

/// [`derive_key`] on the blocking worker pool.
pub async fn derive_key_async(request: KeyRequest) -> Result<DerivedKey> {
    crate::run_blocking(move || derive_key(&request)).await
}

/// [`derive_key_with_salt`] on the blocking worker pool.
pub async fn derive_key_with_salt_async(request: KeyRequest, salt: Vec<u8>) -> Result<DerivedKey> {
    crate::run_blocking(move || derive_key_with_salt(&request, &salt)).await
}

fn stretch(request: &KeyRequest, salt: &[u8], params: Stretch) -> DerivedKey {
    let Stretch {
        digest,
        encoding,
        rounds,
    } = params;
    let password = request.password.as_bytes();
    let mut raw = Zeroizing::new(vec![0u8; request.keylen]);
    match digest {
        Digest::Sha256 => pbkdf2_hmac::<Sha256>(password, salt, rounds, &mut raw[..]),
        Digest::Sha384 => pbkdf2_hmac::<Sha384>(password, salt, rounds, &mut raw[..]),
        Digest::Sha512 => pbkdf2_hmac::<Sha512>(password, salt, rounds, &mut raw[..]),
    }

    let data = match encoding {
        Encoding::Binary => raw,
        Encoding::Hex => cut(hex::encode(&raw[..]), request.keylen),
        Encoding::Base64 => cut(STANDARD.encode(&raw[..]), request.keylen),
    };

    DerivedKey { encoding, data }
}

fn cut(mut text: String, keylen: usize) -> Zeroizing<Vec<u8>> {
    // hex and base64 are ASCII, any index is a char boundary
    text.truncate(keylen);
    Zeroizing::new(text.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> KeyRequest {
        KeyRequest::new("hunter2pass")
            .salt_password("pepperySalt")
            .iterations(1000)
            .keylen(32)
            .digest("sha256")
    }

    #[test]
    fn kdf_is_deterministic_for_a_fixed_salt() {
        let salt = [42u8; 32];
        let k1 = derive_key_with_salt(&request(), &salt).unwrap();
        let k2 = derive_key_with_salt(&request(), &salt).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
        assert_eq!(k1.len(), 32);
        assert_eq!(k1.bits(), 256);
    }

    #[test]
    fn kdf_matches_rfc6070_style_vector() {
        // PBKDF2-HMAC-SHA256, "password" / "salt", 4096 rounds
        let req = KeyRequest::new("password")
            .iterations(4096)
            .keylen(32)
            .digest("sha256");
        let key = derive_key_with_salt(&req, b"salt").unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn fresh_salt_changes_the_key() {
        let k1 = derive_key(&request()).unwrap();
        let k2 = derive_key(&request()).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn salt_password_still_draws_random_salt() {
        let s1 = generate_salt(Some((Digest::Sha512, "pepperySalt"))).unwrap();
        let s2 = generate_salt(Some((Digest::Sha512, "pepperySalt"))).unwrap();
        assert_eq!(s1.len(), 64);
        assert_ne!(*s1, *s2);
        assert_eq!(generate_salt(None).unwrap().len(), SALT_LEN);
    }

    #[test]
    fn hex_output_is_cut_to_keylen_characters() {
        let key = derive_key(&request().encoding("hex")).unwrap();
        let text = key.as_str().unwrap();
        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key.bits(), 128);
    }

    #[test]
    fn hex_output_is_prefix_of_binary_output() {
        let salt = [1u8; 32];
        let bin = derive_key_with_salt(&request(), &salt).unwrap();
        let hex_key = derive_key_with_salt(&request().encoding("hex"), &salt).unwrap();
        assert_eq!(hex_key.as_str().unwrap(), &hex::encode(bin.as_bytes())[..32]);
    }

    #[test]
    fn base64_output_is_cut_to_keylen_characters() {
        let key = derive_key(&request().keylen(16).encoding("base64")).unwrap();
        assert_eq!(key.as_str().unwrap().len(), 16);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let too_few = derive_key(&request().iterations(9)).unwrap_err();
        assert!(matches!(too_few, CrypteError::Validation(ref e) if e.field == Field::Iterations));

        let negative = derive_key(&request().iterations(-5)).unwrap_err();
        assert!(matches!(negative, CrypteError::Validation(ref e) if e.field == Field::Iterations));

        let bad_len = derive_key(&request().keylen(20)).unwrap_err();
        assert!(matches!(bad_len, CrypteError::Validation(ref e) if e.field == Field::Keylen));

        let short = derive_key(&KeyRequest::new(" abc ").iterations(1000)).unwrap_err();
        assert!(matches!(short, CrypteError::Validation(ref e) if e.field == Field::Password));

        let short_salt = derive_key(&request().salt_password("abc")).unwrap_err();
        assert!(
            matches!(short_salt, CrypteError::Validation(ref e) if e.field == Field::SaltPassword)
        );

        assert!(derive_key(&request().digest("sha1")).is_err());
        assert!(derive_key(&request().encoding("utf8")).is_err());
        assert!(derive_key(&request().salt_hash("md5")).is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let dbg = format!("{:?}", request());
        assert!(!dbg.contains("hunter2pass"));
        assert!(!dbg.contains("pepperySalt"));
    }

    #[tokio::test]
    async fn async_form_matches_blocking_form() {
        let salt = vec![9u8; 32];
        let blocking = derive_key_with_salt(&request(), &salt).unwrap();
        let async_key = derive_key_with_salt_async(request(), salt).await.unwrap();
        assert_eq!(blocking.as_bytes(), async_key.as_bytes());

        let fresh = derive_key_async(request()).await.unwrap();
        assert_eq!(fresh.len(), 32);
    }
}
