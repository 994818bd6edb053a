//! Defines the messages exchanged between the host page and the embedded
//! context.
//!
//! Messages are split by phase. [`UnscopedMessage`] is the only kind that may
//! be broadcast without an origin restriction, and it can only ever carry a
//! freshly generated token. Everything else is a [`ScopedMessage`] and must be
//! addressed to a concrete origin or a bound counterparty. The two are
//! distinct types so sensitive data cannot be sent during phase one.
//!
//! 定义宿主页面与嵌入上下文之间交换的消息。
//!
//! 消息按阶段划分。[`UnscopedMessage`] 是唯一可以不限定来源广播的消息，
//! 且只能携带新生成的令牌。其余消息均为 [`ScopedMessage`]，必须发往具体来源
//! 或已绑定的对端。二者是不同的类型，因此第一阶段无法发送敏感数据。

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// An opaque handle for one communication endpoint (a window or frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId(pub u64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint#{}", self.0)
    }
}

/// A scheme/host/port origin such as `https://checkout.example.com`.
///
/// Trailing slashes are stripped so `https://a.com/` and `https://a.com`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin(String);

impl Origin {
    pub fn new(origin: impl AsRef<str>) -> Self {
        Self(origin.as_ref().trim().trim_end_matches('/').to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Embedded → host, phase one: announces the embedded context's token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeInit {
    pub token: String,
    pub timestamp: u64,
}

/// Host → embedded: echoes the token back to the frame's concrete origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeAck {
    pub token: String,
    pub timestamp: u64,
}

/// Host → embedded: the checkout configuration.
///
/// Kept as a raw JSON map because the receiving side treats it as untrusted
/// input; see [`crate::protocol::validator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigPayload {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure,
}

/// Embedded → host: the payment outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    pub outcome: Outcome,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// Embedded → host: the user closed the widget.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedReport {
    #[serde(default)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStage {
    /// A new checkout link was created from a direct configuration.
    CheckoutLinkCreated,
    /// An existing checkout was loaded from its reference code.
    CheckoutDetailsFetched,
}

/// Embedded → host: an intermediate milestone of the checkout flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub stage: ProgressStage,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// Phase-one messages. Safe to send to any recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnscopedMessage {
    HandshakeInit(HandshakeInit),
}

/// Phase-two messages. Only ever sent to a known origin or bound endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopedMessage {
    HandshakeAck(HandshakeAck),
    ConfigPayload(ConfigPayload),
    Result(ResultReport),
    Closed(ClosedReport),
    /// The widget finished rendering; the host may hide its loader.
    CheckoutReady,
    Progress(ProgressReport),
}

impl ScopedMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ScopedMessage::HandshakeAck(_) => "HANDSHAKE_ACK",
            ScopedMessage::ConfigPayload(_) => "CONFIG_PAYLOAD",
            ScopedMessage::Result(_) => "RESULT",
            ScopedMessage::Closed(_) => "CLOSED",
            ScopedMessage::CheckoutReady => "CHECKOUT_READY",
            ScopedMessage::Progress(_) => "PROGRESS",
        }
    }
}

/// Any message as it arrives off the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Unscoped(UnscopedMessage),
    Scoped(ScopedMessage),
}

impl Message {
    /// Decodes a JSON message received from the channel.
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Unscoped(UnscopedMessage::HandshakeInit(_)) => "HANDSHAKE_INIT",
            Message::Scoped(scoped) => scoped.kind(),
        }
    }
}

impl From<UnscopedMessage> for Message {
    fn from(message: UnscopedMessage) -> Self {
        Message::Unscoped(message)
    }
}

impl From<ScopedMessage> for Message {
    fn from(message: ScopedMessage) -> Self {
        Message::Scoped(message)
    }
}

/// A message together with who sent it and from which origin.
///
/// The embedding surface fills in `sender` and `origin`; they are never taken
/// from the message body.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sender: EndpointId,
    pub origin: Origin,
    pub message: Message,
}

impl Envelope {
    pub fn new(sender: EndpointId, origin: Origin, message: impl Into<Message>) -> Self {
        Self {
            sender,
            origin,
            message: message.into(),
        }
    }
}
