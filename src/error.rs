use std::fmt;
use thiserror::Error;

/// A single schema violation found while validating a configuration payload.
///
/// 校验配置负载时发现的单个结构违规。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// The wire name of the offending field, e.g. `email`.
    pub field: &'static str,
    /// A human-readable description of what is wrong.
    pub reason: String,
}

/// The full list of schema violations for one payload.
///
/// Validation never yields partial success: either every rule passes and a
/// sanitized configuration is produced, or this list is returned.
///
/// 一个负载的全部结构违规列表。
///
/// 校验从不产生部分成功：要么所有规则通过并产出净化后的配置，要么返回此列表。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, reason: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns `true` if any violation concerns the given wire field.
    pub fn mentions(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Human-readable messages, one per violation.
    pub fn messages(&self) -> Vec<String> {
        self.iter()
            .map(|e| format!("{}: {}", e.field, e.reason))
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The host never received `HANDSHAKE_INIT` from the frame it created.
    ///
    /// 宿主在时限内未收到其创建的嵌入上下文发来的 `HANDSHAKE_INIT`。
    #[error("handshake did not complete within {waited_ms} ms")]
    HandshakeTimeout { waited_ms: u64 },

    /// Kept internal: mismatched tokens are dropped silently on the wire.
    #[error("handshake token mismatch")]
    TokenMismatch,

    /// Kept internal: messages from unbound senders are dropped silently.
    #[error("message from an untrusted sender")]
    UntrustedSender,

    #[error("configuration payload failed schema validation: {0}")]
    SchemaValidationFailed(ValidationErrors),

    #[error("secure random source unavailable: {0}")]
    SecureRandomUnavailable(String),

    #[error("invalid state transition attempted")]
    InvalidState,

    #[error("received an unexpected or invalid message for the current state")]
    InvalidMessage,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization or deserialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The embedding surface refused an operation (frame creation, post).
    #[error("embedding surface error: {0}")]
    Surface(String),
}

impl From<ValidationErrors> for HandshakeError {
    fn from(errors: ValidationErrors) -> Self {
        HandshakeError::SchemaValidationFailed(errors)
    }
}

pub type Result<T> = std::result::Result<T, HandshakeError>;
