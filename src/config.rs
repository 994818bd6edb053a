//! Configuration for both sides of the channel.
//!
//! Values can be loaded from JSON (missing keys fall back to defaults) and
//! adjusted with builder-style setters. `validate` is called by the
//! components before the configuration is used.
//!
//! 通道两端的配置。可从 JSON 加载（缺失键使用默认值），也可用构建器风格的方法调整。

use crate::error::{HandshakeError, Result};
use crate::protocol::message::Origin;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Host-side settings for the channel gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Origin serving the widget for `pk_test` merchant keys.
    pub sandbox_origin: String,
    /// Origin serving the widget for live merchant keys.
    pub live_origin: String,
    /// Path appended to the origin to form the frame source URL.
    pub frame_path: String,
    /// How long to wait for `HANDSHAKE_INIT` after creating a frame.
    pub handshake_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            sandbox_origin: "https://sandbox.checkout.localhost".into(),
            live_origin: "https://checkout.localhost".into(),
            frame_path: "/".into(),
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
        }
    }
}

impl GatewayConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn sandbox_origin(mut self, origin: impl Into<String>) -> Self {
        self.sandbox_origin = origin.into();
        self
    }

    pub fn live_origin(mut self, origin: impl Into<String>) -> Self {
        self.live_origin = origin.into();
        self
    }

    pub fn handshake_timeout_ms(mut self, timeout: u64) -> Self {
        self.handshake_timeout_ms = timeout;
        self
    }

    /// Picks the widget origin for a merchant environment.
    pub fn origin_for(&self, test_mode: bool) -> Origin {
        if test_mode {
            Origin::new(&self.sandbox_origin)
        } else {
            Origin::new(&self.live_origin)
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, origin) in [
            ("sandboxOrigin", &self.sandbox_origin),
            ("liveOrigin", &self.live_origin),
        ] {
            if !is_concrete_origin(origin) {
                return Err(HandshakeError::InvalidConfig(format!(
                    "{name} must be an http(s) origin, got {origin:?}"
                )));
            }
        }
        if self.handshake_timeout_ms == 0 {
            return Err(HandshakeError::InvalidConfig(
                "handshakeTimeoutMs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Embedded-side settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddedConfig {
    /// How long to wait for `HANDSHAKE_ACK` before showing a failure view.
    pub ack_timeout_ms: u64,
    /// Allow the logged, insecure token fallback when the OS RNG fails.
    pub allow_insecure_token_fallback: bool,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            allow_insecure_token_fallback: false,
        }
    }
}

impl EmbeddedConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn ack_timeout_ms(mut self, timeout: u64) -> Self {
        self.ack_timeout_ms = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ack_timeout_ms == 0 {
            return Err(HandshakeError::InvalidConfig(
                "ackTimeoutMs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// A wildcard or opaque origin would defeat origin-scoped delivery.
fn is_concrete_origin(origin: &str) -> bool {
    let rest = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains('*') && !host.contains(' '))
}
