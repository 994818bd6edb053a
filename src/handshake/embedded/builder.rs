use super::{EmbeddedContext, WidgetView};
use crate::clock::{Clock, SystemClock};
use crate::config::EmbeddedConfig;
use crate::crypto::{EntropySource, FallbackPolicy, OsEntropy, TokenGenerator};
use crate::error::Result;
use crate::handshake::session::Session;

/// A builder for creating an `EmbeddedContext`.
///
/// Every part has a production default: the system clock, the OS entropy
/// source and `EmbeddedConfig::default()`.
///
/// 用于创建 `EmbeddedContext` 的构建器。每一部分都有生产环境默认值。
pub struct EmbeddedContextBuilder<C = SystemClock, E = OsEntropy> {
    config: EmbeddedConfig,
    clock: C,
    entropy: E,
}

impl EmbeddedContextBuilder {
    pub fn new() -> Self {
        Self {
            config: EmbeddedConfig::default(),
            clock: SystemClock,
            entropy: OsEntropy,
        }
    }
}

impl Default for EmbeddedContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock, E: EntropySource> EmbeddedContextBuilder<C, E> {
    pub fn config(mut self, config: EmbeddedConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the time source used for timestamps and the ack timeout.
    ///
    /// 设置用于时间戳与确认超时的时间源。
    pub fn clock<C2: Clock>(self, clock: C2) -> EmbeddedContextBuilder<C2, E> {
        EmbeddedContextBuilder {
            config: self.config,
            clock,
            entropy: self.entropy,
        }
    }

    pub fn entropy<E2: EntropySource>(self, entropy: E2) -> EmbeddedContextBuilder<C, E2> {
        EmbeddedContextBuilder {
            config: self.config,
            clock: self.clock,
            entropy,
        }
    }

    /// Builds the `EmbeddedContext`.
    ///
    /// Returns an error if the configuration is invalid.
    ///
    /// 构建 `EmbeddedContext`。配置无效时返回错误。
    pub fn build(self) -> Result<EmbeddedContext<C, E>> {
        self.config.validate()?;
        let policy = if self.config.allow_insecure_token_fallback {
            FallbackPolicy::AllowInsecure
        } else {
            FallbackPolicy::Deny
        };
        Ok(EmbeddedContext {
            generator: TokenGenerator::with_source(self.entropy).fallback(policy),
            config: self.config,
            clock: self.clock,
            session: Session::new(),
            started_at: None,
            view: WidgetView::Loading,
            checkout: None,
            rejection: None,
        })
    }
}
