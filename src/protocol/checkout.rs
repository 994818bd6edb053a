//! The host-side checkout configuration and how it is sealed into a
//! `CONFIG_PAYLOAD`.

use crate::crypto::Token;
use crate::error::Result;
use crate::protocol::message::ConfigPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the host page passes to `open()`.
///
/// Either `reference_code` points at a prepared transaction, or the direct
/// fields describe a new one. Callbacks are not part of this
/// type; they live in [`crate::gateway::Callbacks`] and have no wire form.
///
/// 宿主页面传给 `open()` 的结账配置。回调不属于此类型，因此永远不会被序列化。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CheckoutConfig {
    /// A direct configuration with its four mandatory fields.
    pub fn direct(
        merchant_key: impl Into<String>,
        amount: f64,
        email: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            merchant_key: Some(merchant_key.into()),
            amount: Some(amount),
            email: Some(email.into()),
            phone_number: Some(phone_number.into()),
            ..Self::default()
        }
    }

    /// A configuration that refers to an already prepared transaction.
    pub fn reference(code: impl Into<String>) -> Self {
        Self {
            reference_code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn customer_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether the configuration targets the sandbox environment.
    pub fn is_test_mode(&self) -> bool {
        self.merchant_key
            .as_deref()
            .is_some_and(|key| key.trim_start().starts_with("pk_test"))
    }

    /// Builds the `CONFIG_PAYLOAD` for an established session.
    ///
    /// Empty values are dropped before sending, then the token, the ready
    /// flag and a timestamp are attached.
    ///
    /// 为已建立的会话构建 `CONFIG_PAYLOAD`：先丢弃空值，再附加令牌、就绪标志和时间戳。
    pub fn seal(&self, token: &Token, timestamp: u64) -> Result<ConfigPayload> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        fields.retain(|_, value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        });
        fields.insert("token".into(), Value::String(token.as_str().to_owned()));
        fields.insert("ready".into(), Value::Bool(true));
        fields.insert("timestamp".into(), Value::from(timestamp));
        Ok(ConfigPayload { fields })
    }
}
