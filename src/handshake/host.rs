//! Implements the host (caller) side of the handshake for one frame.
//!
//! 实现单个嵌入框架在宿主（调用方）一端的握手。

use crate::crypto::Token;
use crate::error::{HandshakeError, Result};
use crate::handshake::session::{Session, SessionId};
use crate::protocol::checkout::CheckoutConfig;
use crate::protocol::message::{
    ClosedReport, EndpointId, Envelope, HandshakeAck, HandshakeInit, Message, Origin,
    ProgressReport, ResultReport, ScopedMessage, UnscopedMessage,
};
use crate::protocol::state::SessionState;
use tracing::{debug, info, warn};

/// What the gateway has to act on after a message was accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The handshake completed and every reply was delivered.
    Established,
    CheckoutReady,
    Progress(ProgressReport),
    Result(ResultReport),
    Closed(ClosedReport),
}

/// Host-side handshake state for the frame this host created.
///
/// 宿主为其创建的嵌入框架维护的握手状态。
#[derive(Debug)]
pub struct HostSession {
    session: Session,
    frame: EndpointId,
    frame_origin: Origin,
    opened_at: u64,
    pending_config: Option<CheckoutConfig>,
}

impl HostSession {
    pub fn new(frame: EndpointId, frame_origin: Origin, opened_at: u64) -> Self {
        Self {
            session: Session::new(),
            frame,
            frame_origin,
            opened_at,
            pending_config: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn frame(&self) -> EndpointId {
        self.frame
    }

    pub fn frame_origin(&self) -> &Origin {
        &self.frame_origin
    }

    pub fn has_pending_config(&self) -> bool {
        self.pending_config.is_some()
    }

    /// Queues a configuration, replacing any earlier unsent one. If the
    /// channel is already trusted the sealed payload is returned for
    /// immediate delivery instead.
    ///
    /// 排队一份配置，替换之前未发送的配置；若通道已受信，则直接返回封装好的负载。
    pub fn submit_config(
        &mut self,
        config: CheckoutConfig,
        now: u64,
    ) -> Result<Option<ScopedMessage>> {
        if self.session.state().is_terminal() {
            return Err(HandshakeError::InvalidState);
        }
        match self.session.token() {
            Some(token) if self.session.is_trusted() => {
                let payload = config.seal(token, now)?;
                Ok(Some(ScopedMessage::ConfigPayload(payload)))
            }
            _ => {
                self.pending_config = Some(config);
                Ok(None)
            }
        }
    }

    /// Processes one inbound envelope.
    ///
    /// Only the frame this host created, speaking from its expected origin,
    /// is listened to. Everything else is dropped without a reply.
    ///
    /// Handshake replies (the ack, then any pending configuration) go out
    /// through `deliver`, in order. The session is trusted only once all of
    /// them were delivered; if one fails the session becomes `FAILED` and the
    /// delivery error is returned.
    ///
    /// 处理一个入站信封。只接受本宿主创建的框架、且来自预期来源的消息，其余一律静默丢弃。
    /// 握手回复经 `deliver` 依次发出，全部送达后会话才受信；任一失败则会话进入 `FAILED`。
    pub fn handle<F>(
        &mut self,
        envelope: Envelope,
        now: u64,
        deliver: F,
    ) -> Result<Option<HostEvent>>
    where
        F: FnMut(&ScopedMessage) -> Result<()>,
    {
        if self.session.state().is_terminal() {
            debug!(
                session = %self.id(),
                kind = envelope.message.kind(),
                "dropping message for finished session"
            );
            return Ok(None);
        }
        if envelope.sender != self.frame || envelope.origin != self.frame_origin {
            warn!(
                session = %self.id(),
                sender = %envelope.sender,
                origin = %envelope.origin,
                kind = envelope.message.kind(),
                "message from unknown source dropped"
            );
            return Ok(None);
        }

        match envelope.message {
            Message::Unscoped(UnscopedMessage::HandshakeInit(init)) => {
                self.on_init(init, now, deliver)
            }
            Message::Scoped(scoped) => Ok(self.on_scoped(scoped)),
        }
    }

    fn on_init<F>(
        &mut self,
        init: HandshakeInit,
        now: u64,
        mut deliver: F,
    ) -> Result<Option<HostEvent>>
    where
        F: FnMut(&ScopedMessage) -> Result<()>,
    {
        if self.session.state() != SessionState::Uninitiated {
            debug!(session = %self.id(), "duplicate handshake init ignored");
            return Ok(None);
        }
        let Some(token) = Token::parse(&init.token) else {
            debug!(session = %self.id(), "malformed handshake init ignored");
            return Ok(None);
        };

        let ack = HandshakeAck {
            token: token.as_str().to_owned(),
            timestamp: now,
        };
        let mut replies = vec![ScopedMessage::HandshakeAck(ack.clone())];
        if let Some(config) = self.pending_config.as_ref() {
            replies.push(ScopedMessage::ConfigPayload(config.seal(&token, now)?));
        }

        for reply in &replies {
            if let Err(err) = deliver(reply) {
                warn!(
                    session = %self.id(),
                    kind = reply.kind(),
                    error = %err,
                    "handshake reply not delivered"
                );
                self.pending_config = None;
                self.session.advance(SessionState::Failed)?;
                return Err(err);
            }
        }

        self.pending_config = None;
        self.session.transcript_mut().record_init(&init)?;
        self.session.transcript_mut().record_ack(&ack)?;
        self.session.set_token(token)?;
        self.session.bind_counterparty(self.frame)?;
        self.session.advance(SessionState::Trusted)?;

        info!(
            session = %self.id(),
            frame = %self.frame,
            transcript = %self.session.transcript().current_hash_hex(),
            "handshake complete with frame"
        );
        Ok(Some(HostEvent::Established))
    }

    fn on_scoped(&mut self, message: ScopedMessage) -> Option<HostEvent> {
        if !self.session.is_trusted_sender(self.frame) {
            debug!(session = %self.id(), kind = message.kind(), "message before handshake dropped");
            return None;
        }
        match message {
            ScopedMessage::CheckoutReady => Some(HostEvent::CheckoutReady),
            ScopedMessage::Progress(report) => Some(HostEvent::Progress(report)),
            ScopedMessage::Result(report) => Some(HostEvent::Result(report)),
            ScopedMessage::Closed(report) => {
                self.session.close();
                Some(HostEvent::Closed(report))
            }
            other => {
                debug!(
                    session = %self.id(),
                    kind = other.kind(),
                    "ignoring host-bound message of wrong direction"
                );
                None
            }
        }
    }

    /// Fails the session if `HANDSHAKE_INIT` has not arrived within
    /// `timeout_ms` of the frame being opened.
    pub fn check_timeout(&mut self, now: u64, timeout_ms: u64) -> Option<HandshakeError> {
        if self.session.state() != SessionState::Uninitiated {
            return None;
        }
        let waited_ms = now.saturating_sub(self.opened_at);
        if waited_ms < timeout_ms {
            return None;
        }
        self.session.advance(SessionState::Failed).ok()?;
        self.pending_config = None;
        warn!(session = %self.id(), waited_ms, "frame never initiated the handshake");
        Some(HandshakeError::HandshakeTimeout { waited_ms })
    }

    /// Invalidates the session synchronously.
    pub fn close(&mut self) {
        self.pending_config = None;
        self.session.close();
    }
}
