//! Password encryption for stored credentials.
//!
//! A secret is encrypted with AES-256-GCM under a fixed process key and a
//! per-call IV derived with PBKDF2 from a freshly salted IV password. The
//! tag, ciphertext and IV are packed into one delimited hex string (see
//! [`format`]) that can be stored in a text column and later verified.

pub mod config;
pub mod crypto;
pub mod env;
mod error;
pub mod format;
pub mod validate;

use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

pub use crate::crypto::{
    DerivedKey, KeyRequest, derive_key, derive_key_async, derive_key_with_salt,
    derive_key_with_salt_async,
};
pub use crate::env::CryptingEnvironment;
pub use crate::error::{
    ConfigError, CrypteError, EnvProblem, Field, FormatError, Result, ValidationError,
};
pub use crate::format::{Delimiters, PackedCiphertext};

use crate::crypto::{IV_LEN, PADDING_LEN, equalize_timing, random_bytes};
use crate::validate::Param;

/// Encrypts, decrypts and verifies secrets under a checked environment.
///
/// Cloning is cheap; clones share the same environment.
#[derive(Debug, Clone)]
pub struct Crypte {
    env: Arc<CryptingEnvironment>,
}

impl Crypte {
    /// Runs the environment guard and fails if the secret material is unusable.
    pub fn new(env: CryptingEnvironment) -> Result<Self> {
        env.check()?;
        Ok(Self { env: Arc::new(env) })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(CryptingEnvironment::from_env())
    }

    pub fn environment(&self) -> &CryptingEnvironment {
        &self.env
    }

    /// Encrypts `plaintext` into a packed ciphertext.
    ///
    /// The IV is derived from a fresh salt on every call, so encrypting the
    /// same plaintext twice never yields the same string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let iv = derive_key(&self.env.iv_request()?)?;
        let iv: [u8; IV_LEN] = iv
            .as_bytes()
            .try_into()
            .map_err(|_| CrypteError::Derivation("derived IV has the wrong length".to_string()))?;

        equalize_timing()?;

        let key = self.cipher_key()?;
        let (ciphertext, tag) = crypto::encrypt(key, &iv, plaintext.as_bytes())?;
        let padding = random_bytes(PADDING_LEN)?;

        Ok(PackedCiphertext {
            tag,
            ciphertext,
            iv,
        }
        .pack(self.env.delimiters(), &padding))
    }

    /// Decrypts a packed ciphertext.
    ///
    /// A malformed string fails with [`CrypteError::Format`], a tampered one
    /// with [`CrypteError::Authentication`].
    pub fn decrypt(&self, packed: &str) -> Result<Zeroizing<String>> {
        let fields = PackedCiphertext::unpack(packed, self.env.delimiters()).inspect_err(|e| {
            debug!("decrypt failed, invalid packed ciphertext: {e}");
        })?;

        let key = self.cipher_key()?;
        let plaintext = crypto::decrypt(key, &fields.iv, &fields.ciphertext, &fields.tag)?;

        let text = std::str::from_utf8(&plaintext).map_err(|_| CrypteError::Utf8)?;
        Ok(Zeroizing::new(text.to_owned()))
    }

    /// Checks `candidate` against a packed ciphertext.
    ///
    /// Returns `Ok(false)` for a plain mismatch and the decryption error when
    /// the packed string cannot be opened.
    pub fn verify(&self, candidate: &str, packed: &str) -> Result<bool> {
        let plaintext = self.decrypt(packed)?;
        Ok(plaintext.as_str() == candidate)
    }

    /// Encrypts a password for storage.
    pub fn crypt_password(&self, plain: &str) -> Result<String> {
        self.encrypt(plain)
    }

    /// Whether `candidate` matches the stored packed password. Any error
    /// counts as a mismatch.
    pub fn verify_password(&self, candidate: &str, packed: &str) -> bool {
        match self.verify(candidate, packed) {
            Ok(matched) => matched,
            Err(e) => {
                debug!("password verification failed: {e}");
                false
            }
        }
    }

    pub async fn encrypt_async(&self, plaintext: impl Into<String>) -> Result<String> {
        let this = self.clone();
        let plaintext = Zeroizing::new(plaintext.into());
        run_blocking(move || this.encrypt(&plaintext)).await
    }

    pub async fn decrypt_async(&self, packed: impl Into<String>) -> Result<Zeroizing<String>> {
        let this = self.clone();
        let packed = packed.into();
        run_blocking(move || this.decrypt(&packed)).await
    }

    pub async fn verify_async(
        &self,
        candidate: impl Into<String>,
        packed: impl Into<String>,
    ) -> Result<bool> {
        let this = self.clone();
        let candidate = Zeroizing::new(candidate.into());
        let packed = packed.into();
        run_blocking(move || this.verify(&candidate, &packed)).await
    }

    pub async fn crypt_password_async(&self, plain: impl Into<String>) -> Result<String> {
        self.encrypt_async(plain).await
    }

    pub async fn verify_password_async(
        &self,
        candidate: impl Into<String>,
        packed: impl Into<String>,
    ) -> bool {
        match self.verify_async(candidate, packed).await {
            Ok(matched) => matched,
            Err(e) => {
                debug!("password verification failed: {e}");
                false
            }
        }
    }

    fn cipher_key(&self) -> Result<&[u8]> {
        let key = self.env.cipher_key()?;
        Param::Key(key).validate()?;
        Ok(key)
    }
}

/// Runs CPU-bound work on the blocking pool and forwards its result.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CrypteError::Worker(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{CIPHER_KEY, IV_ITERATIONS, IV_PASS, SALT_PASS};
    use std::collections::HashMap;

    fn environment(extra: &[(&str, &str)]) -> CryptingEnvironment {
        let mut map: HashMap<&str, &str> = HashMap::from([
            (SALT_PASS, "pepperySalt"),
            (IV_PASS, "ivPassword"),
            (IV_ITERATIONS, "1000"),
            (CIPHER_KEY, "0123456789abcdef0123456789abcdef"),
        ]);
        map.extend(extra.iter().copied());
        CryptingEnvironment::from_lookup(|name| map.get(name).map(|v| v.to_string()))
    }

    fn crypte() -> Crypte {
        Crypte::new(environment(&[])).unwrap()
    }

    fn flip_hex(c: char) -> char {
        if c == '0' { '1' } else { '0' }
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let c = crypte();
        for plain in ["", "hunter2", "-pepper-chilli-oignon-", "mot de passe é ü 🔑"] {
            let packed = c.encrypt(plain).unwrap();
            assert_eq!(c.decrypt(&packed).unwrap().as_str(), plain);
        }
    }

    #[test]
    fn encryption_is_not_deterministic() {
        let c = crypte();
        let a = c.encrypt("same secret").unwrap();
        let b = c.encrypt("same secret").unwrap();
        assert_ne!(a, b);
        assert_eq!(c.decrypt(&a).unwrap().as_str(), "same secret");
        assert_eq!(c.decrypt(&b).unwrap().as_str(), "same secret");
    }

    #[test]
    fn packed_layout_has_expected_segments() {
        let c = crypte();
        let packed = c.encrypt("abc").unwrap();
        let (tag, rest) = packed.split_once("-pepper-").unwrap();
        let (content, rest) = rest.split_once("-chilli-").unwrap();
        let (iv, padding) = rest.split_once("-oignon-").unwrap();
        assert_eq!(tag.len(), 32);
        assert_eq!(content.len(), 6);
        assert_eq!(iv.len(), 32);
        assert_eq!(padding.len(), 24);
    }

    #[test]
    fn tampered_tag_or_content_fails_authentication() {
        let c = crypte();
        let packed = c.encrypt("secret value").unwrap();
        let content_start = packed.find("-pepper-").unwrap() + "-pepper-".len();

        for index in [0, 31, content_start, content_start + 5] {
            let mut chars: Vec<char> = packed.chars().collect();
            chars[index] = flip_hex(chars[index]);
            let tampered: String = chars.into_iter().collect();
            assert!(matches!(
                c.decrypt(&tampered),
                Err(CrypteError::Authentication)
            ));
        }
    }

    #[test]
    fn malformed_packed_strings_fail_with_format_error() {
        let c = crypte();
        let packed = c.encrypt("secret").unwrap();

        let no_chilli = packed.replace("-chilli-", "");
        let doubled = format!("{packed}-pepper-");
        for bad in ["", "not packed at all", no_chilli.as_str(), doubled.as_str()] {
            assert!(matches!(c.decrypt(bad), Err(CrypteError::Format(_))));
        }
    }

    #[test]
    fn non_utf8_plaintext_is_an_error() {
        let c = crypte();
        let iv = [7u8; IV_LEN];
        let (ciphertext, tag) =
            crypto::encrypt(b"0123456789abcdef0123456789abcdef", &iv, &[0xff, 0xfe, 0x00]).unwrap();
        let packed = PackedCiphertext {
            tag,
            ciphertext,
            iv,
        }
        .pack(c.environment().delimiters(), &[0; PADDING_LEN]);

        assert!(matches!(c.decrypt(&packed), Err(CrypteError::Utf8)));
        assert!(!c.verify_password("anything", &packed));
    }

    #[test]
    fn verify_matches_only_the_encrypted_secret() {
        let c = crypte();
        let packed = c.crypt_password("hunter2pass").unwrap();
        assert!(c.verify("hunter2pass", &packed).unwrap());
        assert!(!c.verify("hunter2pasS", &packed).unwrap());
        assert!(c.verify_password("hunter2pass", &packed));
        assert!(!c.verify_password("other", &packed));
    }

    #[test]
    fn verify_reports_decryption_errors_as_no_match() {
        let c = crypte();
        assert!(c.verify("x", "garbage").is_err());
        assert!(!c.verify_password("x", "garbage"));
    }

    #[test]
    fn other_environment_cannot_decrypt() {
        let packed = crypte().encrypt("secret").unwrap();
        let other = Crypte::new(environment(&[(CIPHER_KEY, "fedcba9876543210fedcba9876543210")]))
            .unwrap();
        assert!(matches!(
            other.decrypt(&packed),
            Err(CrypteError::Authentication)
        ));
    }

    #[test]
    fn guard_blocks_construction() {
        let err = Crypte::new(environment(&[(CIPHER_KEY, "short")])).unwrap_err();
        assert!(matches!(err, CrypteError::Configuration(_)));
    }

    #[test]
    fn weak_iv_iterations_fail_validation_at_call_time() {
        for raw in ["5", "-5", "5.5"] {
            let c = Crypte::new(environment(&[(IV_ITERATIONS, raw)])).unwrap();
            assert!(matches!(
                c.encrypt("secret"),
                Err(CrypteError::Validation(ValidationError {
                    field: Field::Iterations,
                    ..
                }))
            ));
        }
    }

    #[test]
    fn unsupported_iv_digest_fails_validation_at_call_time() {
        let c = Crypte::new(environment(&[("IV_DIGEST", "md5")])).unwrap();
        assert!(matches!(
            c.encrypt("secret"),
            Err(CrypteError::Validation(ValidationError {
                field: Field::Hash,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn async_forms_agree_with_blocking_forms() {
        let c = crypte();
        let packed = c.encrypt_async("async secret").await.unwrap();
        assert_eq!(c.decrypt(&packed).unwrap().as_str(), "async secret");
        assert_eq!(
            c.decrypt_async(packed.clone()).await.unwrap().as_str(),
            "async secret"
        );
        assert!(c.verify_async("async secret", packed.clone()).await.unwrap());
        assert!(!c.verify_password_async("nope", packed).await);

        let stored = c.crypt_password_async("pw12345").await.unwrap();
        assert!(c.verify_password_async("pw12345", stored).await);
        assert!(matches!(
            c.decrypt_async("broken").await,
            Err(CrypteError::Format(_))
        ));
    }
}
