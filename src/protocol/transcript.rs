//! Manages the hashing of the handshake transcript.
//!
//! Both sides feed the `HANDSHAKE_INIT` and `HANDSHAKE_ACK` messages through
//! the same canonical JSON encoding, so after a successful handshake the two
//! transcripts agree. The digest can be logged and compared across sides
//! without revealing the token.
//!
//! 管理握手记录的哈希计算。
//!
//! 双方以相同的规范 JSON 编码输入 `HANDSHAKE_INIT` 与 `HANDSHAKE_ACK`，
//! 因此握手成功后两份记录一致。摘要可以记录到日志并在两端比对，而不会泄露令牌。
use crate::error::Result;
use crate::protocol::message::{HandshakeAck, HandshakeInit};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    /// Creates a new, empty transcript.
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn record_init(&mut self, init: &HandshakeInit) -> Result<()> {
        self.update(b"HANDSHAKE_INIT", &serde_json::to_vec(init)?);
        Ok(())
    }

    pub fn record_ack(&mut self, ack: &HandshakeAck) -> Result<()> {
        self.update(b"HANDSHAKE_ACK", &serde_json::to_vec(ack)?);
        Ok(())
    }

    fn update(&mut self, label: &[u8], bytes: &[u8]) {
        self.hasher.update((label.len() as u32).to_be_bytes());
        self.hasher.update(label);
        self.hasher.update((bytes.len() as u32).to_be_bytes());
        self.hasher.update(bytes);
    }

    /// Returns the current hash without consuming the transcript.
    ///
    /// 返回当前的哈希值，而不会消耗握手记录。
    pub fn current_hash(&self) -> Vec<u8> {
        self.hasher.clone().finalize().to_vec()
    }

    pub fn current_hash_hex(&self) -> String {
        hex::encode(self.current_hash())
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
