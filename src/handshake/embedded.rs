//! Implements the embedded-context (callee) side of the handshake.
//!
//! The context does not perform I/O: `start` returns the phase-one broadcast,
//! `handle` consumes inbound envelopes and the `report_*` methods return
//! addressed phase-two messages for the caller to deliver.
//!
//! 实现握手协议的嵌入上下文（被调用方）一端。
//!
//! 该上下文不执行 I/O：`start` 返回第一阶段广播，`handle` 处理入站信封，
//! `report_*` 方法返回已指定收件方的第二阶段消息，由调用方投递。

use crate::clock::{Clock, SystemClock};
use crate::config::EmbeddedConfig;
use crate::crypto::{EntropySource, OsEntropy, TokenGenerator};
use crate::error::{HandshakeError, Result, ValidationErrors};
use crate::handshake::session::{Session, SessionId};
use crate::protocol::message::{
    ClosedReport, ConfigPayload, EndpointId, Envelope, HandshakeAck, HandshakeInit, Message,
    Outcome, ProgressReport, ProgressStage, ResultReport, ScopedMessage, UnscopedMessage,
};
use crate::protocol::state::SessionState;
use crate::protocol::validator::{self, SanitizedConfig};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

mod builder;

pub use builder::EmbeddedContextBuilder;

/// What the widget UI may show. Carries no protocol details.
///
/// 组件界面可以展示的内容，不包含任何协议细节。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetView {
    Loading,
    Checkout,
    Failed,
    Closed,
}

/// Notable transitions reported back to the widget's own logic.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedEvent {
    /// The ack matched; `counterparty` is now the only accepted sender.
    Trusted { counterparty: EndpointId },
    /// A validated configuration is ready to drive the checkout.
    Configured(SanitizedConfig),
    /// No ack arrived in time.
    HandshakeFailed,
}

/// A phase-two message and the bound endpoint it must be delivered to.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: EndpointId,
    pub message: ScopedMessage,
}

/// The embedded-context handshake state machine.
///
/// 嵌入上下文的握手状态机。
#[derive(Debug)]
pub struct EmbeddedContext<C = SystemClock, E = OsEntropy> {
    pub(super) config: EmbeddedConfig,
    pub(super) clock: C,
    pub(super) generator: TokenGenerator<E>,
    pub(super) session: Session,
    /// When `HANDSHAKE_INIT` was produced; the ack timeout runs from here.
    pub(super) started_at: Option<u64>,
    pub(super) view: WidgetView,
    pub(super) checkout: Option<SanitizedConfig>,
    pub(super) rejection: Option<ValidationErrors>,
}

impl EmbeddedContext {
    pub fn builder() -> EmbeddedContextBuilder {
        EmbeddedContextBuilder::new()
    }
}

impl<C: Clock, E: EntropySource> EmbeddedContext<C, E> {
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn view(&self) -> WidgetView {
        self.view
    }

    /// The accepted configuration, once one has been validated.
    pub fn checkout(&self) -> Option<&SanitizedConfig> {
        self.checkout.as_ref()
    }

    /// Why the last configuration payload was refused. Local use only.
    pub fn rejection(&self) -> Option<&ValidationErrors> {
        self.rejection.as_ref()
    }

    /// Generates the session token and returns the `HANDSHAKE_INIT` to
    /// broadcast to the parent.
    ///
    /// This is the only message sent without an origin restriction; it
    /// carries nothing but the fresh token.
    ///
    /// 生成会话令牌并返回需广播给父窗口的 `HANDSHAKE_INIT`。
    pub fn start(&mut self) -> Result<UnscopedMessage> {
        if self.session.state() != SessionState::Uninitiated {
            return Err(HandshakeError::InvalidState);
        }
        let token = self.generator.generate()?;
        let now = self.clock.now_millis();
        let init = HandshakeInit {
            token: token.as_str().to_owned(),
            timestamp: now,
        };

        info!(
            session = %self.session.id(),
            token = %token.fingerprint(),
            "initiating handshake with parent"
        );
        self.session.transcript_mut().record_init(&init)?;
        self.session.set_token(token)?;
        self.session.advance(SessionState::TokenSent)?;
        self.started_at = Some(now);

        Ok(UnscopedMessage::HandshakeInit(init))
    }

    /// Processes one inbound envelope.
    ///
    /// Authentication failures are dropped silently: nothing is returned and
    /// nothing is sent back.
    ///
    /// 处理一个入站信封。认证失败会被静默丢弃，不返回也不回复任何内容。
    pub fn handle(&mut self, envelope: Envelope) -> Option<EmbeddedEvent> {
        if self.session.state().is_terminal() {
            debug!(
                session = %self.session.id(),
                kind = envelope.message.kind(),
                "dropping message for finished session"
            );
            return None;
        }
        match envelope.message {
            Message::Scoped(ScopedMessage::HandshakeAck(ack)) => self.on_ack(envelope.sender, ack),
            Message::Scoped(ScopedMessage::ConfigPayload(payload)) => {
                self.on_config(envelope.sender, payload)
            }
            other => {
                debug!(
                    session = %self.session.id(),
                    kind = other.kind(),
                    "ignoring unexpected message"
                );
                None
            }
        }
    }

    fn on_ack(&mut self, sender: EndpointId, ack: HandshakeAck) -> Option<EmbeddedEvent> {
        if self.session.state() != SessionState::TokenSent {
            if self.session.trusted_counterparty() != Some(sender) {
                warn!(session = %self.session.id(), %sender, "ack from unbound sender dropped");
            } else {
                debug!(session = %self.session.id(), "duplicate ack ignored");
            }
            return None;
        }
        let matches = self
            .session
            .token()
            .is_some_and(|token| token.matches(&ack.token));
        if !matches {
            debug!(session = %self.session.id(), %sender, "ack rejected");
            return None;
        }

        if let Err(err) = self.bind(sender, &ack) {
            error!(session = %self.session.id(), error = %err, "could not complete handshake");
            return None;
        }
        info!(
            session = %self.session.id(),
            counterparty = %sender,
            transcript = %self.session.transcript().current_hash_hex(),
            "handshake completed with parent"
        );
        Some(EmbeddedEvent::Trusted {
            counterparty: sender,
        })
    }

    fn bind(&mut self, sender: EndpointId, ack: &HandshakeAck) -> Result<()> {
        self.session.bind_counterparty(sender)?;
        self.session.transcript_mut().record_ack(ack)?;
        self.session.advance(SessionState::Trusted)
    }

    fn on_config(&mut self, sender: EndpointId, payload: ConfigPayload) -> Option<EmbeddedEvent> {
        if !self.session.is_trusted_sender(sender) {
            debug!(
                session = %self.session.id(),
                %sender,
                state = %self.session.state(),
                "config payload dropped"
            );
            return None;
        }
        if self.checkout.is_some() || self.rejection.is_some() {
            debug!(session = %self.session.id(), "config already processed; ignoring");
            return None;
        }
        let token = self.session.token()?;
        match validator::validate(&payload, token) {
            Ok(config) => {
                info!(
                    session = %self.session.id(),
                    provider = config.details().provider.as_deref().unwrap_or("default"),
                    "payment data validated and sanitized"
                );
                self.view = WidgetView::Checkout;
                self.checkout = Some(config.clone());
                Some(EmbeddedEvent::Configured(config))
            }
            Err(errors) => {
                error!(session = %self.session.id(), errors = %errors, "invalid payment data");
                self.view = WidgetView::Failed;
                self.rejection = Some(errors);
                None
            }
        }
    }

    /// Enforces the ack timeout. Call periodically.
    pub fn poll(&mut self) -> Option<EmbeddedEvent> {
        let started = self.started_at?;
        if self.session.state() != SessionState::TokenSent {
            return None;
        }
        let waited = self.clock.now_millis().saturating_sub(started);
        if waited < self.config.ack_timeout_ms {
            return None;
        }
        warn!(session = %self.session.id(), waited_ms = waited, "handshake was never acknowledged");
        self.session.advance(SessionState::Failed).ok()?;
        self.view = WidgetView::Failed;
        Some(EmbeddedEvent::HandshakeFailed)
    }

    fn outbound(&self, message: ScopedMessage) -> Result<Outbound> {
        match self.session.trusted_counterparty() {
            Some(to) if self.session.is_trusted() => Ok(Outbound { to, message }),
            _ => Err(HandshakeError::InvalidState),
        }
    }

    /// Tells the host the widget has rendered.
    pub fn report_ready(&self) -> Result<Outbound> {
        self.outbound(ScopedMessage::CheckoutReady)
    }

    pub fn report_progress(
        &self,
        stage: ProgressStage,
        details: Map<String, Value>,
    ) -> Result<Outbound> {
        self.outbound(ScopedMessage::Progress(ProgressReport { stage, details }))
    }

    pub fn report_result(&self, outcome: Outcome, details: Map<String, Value>) -> Result<Outbound> {
        self.outbound(ScopedMessage::Result(ResultReport { outcome, details }))
    }

    /// Produces the `CLOSED` message and ends the session.
    pub fn report_closed(&mut self, details: Map<String, Value>) -> Result<Outbound> {
        let outbound = self.outbound(ScopedMessage::Closed(ClosedReport { details }))?;
        self.close();
        Ok(outbound)
    }

    /// Ends the session locally; later messages are dropped.
    pub fn close(&mut self) {
        self.session.close();
        self.view = WidgetView::Closed;
    }
}
