//! Generates the session token that anchors the handshake.
//!
//! The token is created inside the embedded context and never leaves it
//! except in the one-shot `HANDSHAKE_INIT` broadcast. Anything that wants to
//! refer to a token in logs uses [`Token::fingerprint`] instead.
//!
//! 生成锚定握手的会话令牌。
//!
//! 令牌在嵌入上下文内部创建，除一次性的 `HANDSHAKE_INIT` 广播外从不离开。
//! 日志中引用令牌时一律使用 [`Token::fingerprint`]。

use crate::error::{HandshakeError, Result};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng, TryRngCore};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use tracing::warn;

/// Number of random bytes in a token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Length of the hex encoding carried on the wire.
pub const TOKEN_HEX_LEN: usize = TOKEN_BYTES * 2;

/// A 256-bit session token in its lowercase hex wire form.
///
/// Immutable once created. `Debug` is redacted and equality is constant-time.
#[derive(Clone)]
pub struct Token {
    hex: String,
}

impl Token {
    fn from_bytes(bytes: &[u8; TOKEN_BYTES]) -> Self {
        Self {
            hex: hex::encode(bytes),
        }
    }

    /// Parses a token received on the wire.
    ///
    /// Returns `None` unless the input is exactly 64 hex characters.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() != TOKEN_HEX_LEN {
            return None;
        }
        let mut bytes = [0u8; TOKEN_BYTES];
        hex::decode_to_slice(raw, &mut bytes).ok()?;
        Some(Self::from_bytes(&bytes))
    }

    /// The hex string sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Constant-time comparison against an untrusted candidate string.
    pub fn matches(&self, candidate: &str) -> bool {
        self.hex.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// A short, non-reversible identifier safe to put in logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.hex.as_bytes());
        hex::encode(&digest[..4])
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.hex)
    }
}

impl Eq for Token {}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// A source of cryptographically secure random bytes.
pub trait EntropySource {
    fn try_fill(&mut self, dest: &mut [u8]) -> Result<()>;
}

/// The operating system's secure random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn try_fill(&mut self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| HandshakeError::SecureRandomUnavailable(e.to_string()))
    }
}

/// What to do when the secure source cannot produce bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Fail with `SecureRandomUnavailable`.
    #[default]
    Deny,
    /// Log a warning and fall back to a time-seeded PRNG.
    AllowInsecure,
}

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Produces session tokens.
///
/// 生成会话令牌。
#[derive(Debug, Clone, Default)]
pub struct TokenGenerator<E = OsEntropy> {
    source: E,
    fallback: FallbackPolicy,
}

impl TokenGenerator<OsEntropy> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: EntropySource> TokenGenerator<E> {
    pub fn with_source(source: E) -> Self {
        Self {
            source,
            fallback: FallbackPolicy::Deny,
        }
    }

    pub fn fallback(mut self, policy: FallbackPolicy) -> Self {
        self.fallback = policy;
        self
    }

    /// Generates a fresh 256-bit token.
    ///
    /// 生成新的 256 位令牌。
    pub fn generate(&mut self) -> Result<Token> {
        let mut bytes = [0u8; TOKEN_BYTES];
        match self.source.try_fill(&mut bytes) {
            Ok(()) => Ok(Token::from_bytes(&bytes)),
            Err(err) if self.fallback == FallbackPolicy::AllowInsecure => {
                warn!(
                    error = %err,
                    "secure random source unavailable; using insecure fallback generator"
                );
                fill_insecure(&mut bytes);
                Ok(Token::from_bytes(&bytes))
            }
            Err(err) => Err(err),
        }
    }
}

fn fill_insecure(dest: &mut [u8]) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let counter = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = nanos ^ counter.rotate_left(32) ^ u64::from(std::process::id());
    StdRng::seed_from_u64(seed).fill_bytes(dest);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct BrokenEntropy;

    impl EntropySource for BrokenEntropy {
        fn try_fill(&mut self, _dest: &mut [u8]) -> Result<()> {
            Err(HandshakeError::SecureRandomUnavailable("no device".into()))
        }
    }

    #[test]
    fn generates_64_lowercase_hex_chars() {
        let token = TokenGenerator::new().generate().unwrap();
        assert_eq!(token.as_str().len(), TOKEN_HEX_LEN);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn ten_thousand_tokens_are_distinct() {
        let mut generator = TokenGenerator::new();
        let tokens: HashSet<String> = (0..10_000)
            .map(|_| generator.generate().unwrap().as_str().to_owned())
            .collect();
        assert_eq!(tokens.len(), 10_000);
    }

    #[test]
    fn missing_entropy_fails_loudly_by_default() {
        let err = TokenGenerator::with_source(BrokenEntropy)
            .generate()
            .unwrap_err();
        assert!(matches!(err, HandshakeError::SecureRandomUnavailable(_)));
    }

    #[test]
    fn insecure_fallback_is_opt_in() {
        let token = TokenGenerator::with_source(BrokenEntropy)
            .fallback(FallbackPolicy::AllowInsecure)
            .generate()
            .unwrap();
        assert_eq!(token.as_str().len(), TOKEN_HEX_LEN);
    }

    #[test]
    fn parse_rejects_malformed_tokens() {
        assert!(Token::parse("abc").is_none());
        assert!(Token::parse(&"z".repeat(TOKEN_HEX_LEN)).is_none());
        let token = TokenGenerator::new().generate().unwrap();
        let parsed = Token::parse(token.as_str()).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn debug_output_never_contains_the_token() {
        let token = TokenGenerator::new().generate().unwrap();
        let rendered = format!("{token:?}");
        assert!(!rendered.contains(token.as_str()));
        assert!(rendered.contains(&token.fingerprint()));
    }

    #[test]
    fn matches_requires_exact_value() {
        let token = TokenGenerator::new().generate().unwrap();
        assert!(token.matches(token.as_str()));
        assert!(!token.matches(&token.as_str()[..TOKEN_HEX_LEN - 1]));
        assert!(!token.matches(&token.as_str().to_uppercase()));
        assert!(!token.matches(""));
    }
}
