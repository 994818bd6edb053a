//! The per-instantiation session shared by both roles.
//!
//! 双方角色共用的会话，每次实例化一个。

use crate::crypto::Token;
use crate::error::{HandshakeError, Result};
use crate::protocol::message::EndpointId;
use crate::protocol::state::SessionState;
use crate::protocol::transcript::Transcript;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Identifies one embedded-context lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Owned session state.
///
/// The token and the trusted counterparty are write-once; the state only
/// moves forward.
///
/// 会话状态。令牌与受信对端只写一次，状态只能向前推进。
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    token: Option<Token>,
    state: SessionState,
    trusted_counterparty: Option<EndpointId>,
    transcript: Transcript,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            token: None,
            state: SessionState::Uninitiated,
            trusted_counterparty: None,
            transcript: Transcript::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn trusted_counterparty(&self) -> Option<EndpointId> {
        self.trusted_counterparty
    }

    pub fn is_trusted(&self) -> bool {
        self.state == SessionState::Trusted
    }

    /// True only for the bound counterparty of a trusted session.
    pub fn is_trusted_sender(&self, sender: EndpointId) -> bool {
        self.is_trusted() && self.trusted_counterparty == Some(sender)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub(crate) fn transcript_mut(&mut self) -> &mut Transcript {
        &mut self.transcript
    }

    /// Sets the token. Fails if one was already set.
    pub(crate) fn set_token(&mut self, token: Token) -> Result<()> {
        if self.token.is_some() {
            return Err(HandshakeError::InvalidState);
        }
        self.token = Some(token);
        Ok(())
    }

    /// Binds the counterparty. First writer wins; a second bind is refused.
    pub(crate) fn bind_counterparty(&mut self, endpoint: EndpointId) -> Result<()> {
        if self.trusted_counterparty.is_some() {
            return Err(HandshakeError::UntrustedSender);
        }
        self.trusted_counterparty = Some(endpoint);
        Ok(())
    }

    pub(crate) fn advance(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(HandshakeError::InvalidState);
        }
        debug!(session = %self.id, from = %self.state, to = %next, "session state transition");
        self.state = next;
        Ok(())
    }

    /// Invalidates the session immediately. Idempotent for terminal states.
    pub fn close(&mut self) {
        if !self.state.is_terminal() {
            debug!(session = %self.id, from = %self.state, "session closed");
            self.state = SessionState::Closed;
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
