//! Defines the states of the handshake protocol state machine.
//!
//! Messages arrive as independent events, so the state is tracked at runtime
//! rather than in the type system. Transitions only ever move forward; the
//! check lives in [`SessionState::can_advance_to`] and is enforced by
//! [`crate::handshake::session::Session`].
//!
//! 定义握手协议状态机的各个状态。
//!
//! 消息以独立事件的形式到达，因此状态在运行时跟踪，而非编码在类型系统中。
//! 状态转换只会向前推进。

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created, no token exchanged yet.
    ///
    /// 已创建，尚未交换令牌。
    Uninitiated,
    /// Embedded side: token generated and broadcast, waiting for the ack.
    ///
    /// 嵌入端：令牌已生成并广播，等待确认。
    TokenSent,
    /// Counterparty bound; authenticated payloads may flow.
    ///
    /// 对端已绑定，可以传输经过认证的负载。
    Trusted,
    /// Torn down by its owner. Terminal.
    Closed,
    /// The handshake never completed in time. Terminal, distinct from `Closed`.
    Failed,
}

impl SessionState {
    fn rank(self) -> u8 {
        match self {
            SessionState::Uninitiated => 0,
            SessionState::TokenSent => 1,
            SessionState::Trusted => 2,
            SessionState::Closed | SessionState::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Whether moving from `self` to `next` respects monotonic ordering.
    ///
    /// `Failed` is only reachable before trust is established: a trusted
    /// session can only end by being closed.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            SessionState::Failed => self.rank() < SessionState::Trusted.rank(),
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitiated => "UNINITIATED",
            SessionState::TokenSent => "TOKEN_SENT",
            SessionState::Trusted => "TRUSTED",
            SessionState::Closed => "CLOSED",
            SessionState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(Uninitiated.can_advance_to(TokenSent));
        assert!(TokenSent.can_advance_to(Trusted));
        assert!(Uninitiated.can_advance_to(Trusted));
        assert!(Trusted.can_advance_to(Closed));
        assert!(Uninitiated.can_advance_to(Closed));
    }

    #[test]
    fn backward_and_terminal_transitions_are_refused() {
        assert!(!Trusted.can_advance_to(TokenSent));
        assert!(!TokenSent.can_advance_to(TokenSent));
        assert!(!Closed.can_advance_to(Trusted));
        assert!(!Failed.can_advance_to(Closed));
        assert!(!Closed.can_advance_to(Failed));
    }

    #[test]
    fn failure_only_before_trust() {
        assert!(Uninitiated.can_advance_to(Failed));
        assert!(TokenSent.can_advance_to(Failed));
        assert!(!Trusted.can_advance_to(Failed));
    }
}
