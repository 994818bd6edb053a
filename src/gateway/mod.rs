//! The host-side channel gateway.
//!
//! The gateway owns the embedded context's lifecycle and is the only path
//! for outbound sends. At most one frame is active at a time: opening a new
//! one first tears down the previous frame and invalidates its session.
//!
//! 宿主端通道网关。
//!
//! 网关负责嵌入上下文的生命周期，并且是所有出站消息的唯一通道。
//! 同一时间最多只有一个活动框架：打开新框架前会先拆除旧框架并使其会话失效。

use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::error::{HandshakeError, Result, ValidationErrors};
use crate::handshake::host::{HostEvent, HostSession};
use crate::handshake::session::{Session, SessionId};
use crate::protocol::checkout::CheckoutConfig;
use crate::protocol::message::{ClosedReport, Envelope, ProgressReport, ResultReport};
use crate::protocol::state::SessionState;
use crate::protocol::validator;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

mod surface;

pub use surface::{EmbedSurface, FrameSpec};

type Handler<T> = Box<dyn FnMut(&T)>;

/// Host callbacks. They stay on the host and are never serialized.
///
/// 宿主回调。它们只存在于宿主端，永远不会被序列化。
#[derive(Default)]
pub struct Callbacks {
    on_result: Option<Handler<ResultReport>>,
    on_close: Option<Handler<ClosedReport>>,
    on_progress: Option<Handler<ProgressReport>>,
    on_error: Option<Handler<HandshakeError>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_result(mut self, f: impl FnMut(&ResultReport) + 'static) -> Self {
        self.on_result = Some(Box::new(f));
        self
    }

    pub fn on_close(mut self, f: impl FnMut(&ClosedReport) + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl FnMut(&ProgressReport) + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Called when the session fails, e.g. on `HandshakeTimeout`.
    pub fn on_error(mut self, f: impl FnMut(&HandshakeError) + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_result", &self.on_result.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[derive(Debug)]
struct Active {
    host: HostSession,
    callbacks: Callbacks,
    mounted: bool,
}

/// Owns the embedded frame and mediates everything sent to it.
///
/// 持有嵌入框架并中转发往它的所有消息。
pub struct ChannelGateway<S, C = SystemClock> {
    config: GatewayConfig,
    surface: S,
    clock: C,
    active: Option<Active>,
}

impl<S: EmbedSurface> ChannelGateway<S, SystemClock> {
    pub fn new(config: GatewayConfig, surface: S) -> Result<Self> {
        Self::with_clock(config, surface, SystemClock)
    }
}

impl<S: EmbedSurface, C: Clock> ChannelGateway<S, C> {
    pub fn with_clock(config: GatewayConfig, surface: S, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            surface,
            clock,
            active: None,
        })
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.host.id())
    }

    /// The most recent session, if any was opened.
    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|a| a.host.session())
    }

    /// State of the most recent session, if any was opened.
    pub fn state(&self) -> Option<SessionState> {
        self.active.as_ref().map(|a| a.host.state())
    }

    /// Opens a checkout frame.
    ///
    /// The configuration is checked against the checkout schema first. Any
    /// active frame is torn down before the new one is created. The
    /// configuration is held until the frame completes the handshake.
    ///
    /// 打开结账框架。先按结账结构校验配置，再拆除现有框架并创建新框架。
    /// 配置会一直保留到框架完成握手。
    pub fn open(&mut self, config: CheckoutConfig, callbacks: Callbacks) -> Result<SessionId> {
        // Non-finite amounts serialize as null and would read as missing.
        if config.amount.is_some_and(|amount| !amount.is_finite()) {
            let mut errors = ValidationErrors::new();
            errors.push("amount", "must be a positive number");
            return Err(errors.into());
        }
        let fields = match serde_json::to_value(&config)? {
            Value::Object(map) => map,
            _ => return Err(HandshakeError::InvalidMessage),
        };
        validator::validate_schema(&fields)?;

        self.teardown();

        let origin = self.config.origin_for(config.is_test_mode());
        let spec = FrameSpec {
            src: format!("{}{}", origin, self.config.frame_path),
            origin: origin.clone(),
        };
        let frame = self.surface.create_frame(&spec)?;
        self.surface.show_loader(frame);

        let now = self.clock.now_millis();
        let mut host = HostSession::new(frame, origin, now);
        host.submit_config(config, now)?;
        let id = host.id();
        info!(session = %id, %frame, origin = %host.frame_origin(), "waiting for frame handshake");

        self.active = Some(Active {
            host,
            callbacks,
            mounted: true,
        });
        Ok(id)
    }

    /// Tears down the active frame. No callbacks fire.
    pub fn close(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.host.close();
            if active.mounted {
                self.surface.remove_frame(active.host.frame());
            }
            debug!(session = %active.host.id(), "frame torn down");
        }
    }

    /// Routes an inbound message to the active session.
    ///
    /// Callbacks fire only for messages attested by the trusted frame. If a
    /// handshake reply cannot be posted the frame is removed, the session
    /// becomes `FAILED`, `on_error` is called and the error is returned.
    pub fn handle_message(&mut self, envelope: Envelope) -> Result<()> {
        let now = self.clock.now_millis();
        let Some(active) = self.active.as_mut() else {
            debug!(
                sender = %envelope.sender,
                kind = envelope.message.kind(),
                "no active frame; message dropped"
            );
            return Ok(());
        };
        let frame = active.host.frame();
        let origin = active.host.frame_origin().clone();
        let surface = &mut self.surface;

        let delivered = active
            .host
            .handle(envelope, now, |reply| surface.post(frame, &origin, reply));
        let event = match delivered {
            Ok(event) => event,
            Err(err) => {
                if active.host.state() == SessionState::Failed {
                    warn!(
                        session = %active.host.id(),
                        error = %err,
                        "checkout frame failed to connect"
                    );
                    if active.mounted {
                        surface.remove_frame(frame);
                        active.mounted = false;
                    }
                    if let Some(f) = active.callbacks.on_error.as_mut() {
                        f(&err);
                    }
                }
                return Err(err);
            }
        };

        match event {
            None => {}
            Some(HostEvent::Established) => {
                info!(session = %active.host.id(), %frame, "frame connected");
            }
            Some(HostEvent::CheckoutReady) => self.surface.hide_loader(frame),
            Some(HostEvent::Progress(report)) => {
                if let Some(f) = active.callbacks.on_progress.as_mut() {
                    f(&report);
                }
            }
            Some(HostEvent::Result(report)) => {
                info!(
                    session = %active.host.id(),
                    outcome = ?report.outcome,
                    "checkout result received"
                );
                if let Some(f) = active.callbacks.on_result.as_mut() {
                    f(&report);
                }
            }
            Some(HostEvent::Closed(report)) => {
                info!(session = %active.host.id(), "frame reported close");
                if active.mounted {
                    self.surface.remove_frame(frame);
                    active.mounted = false;
                }
                if let Some(f) = active.callbacks.on_close.as_mut() {
                    f(&report);
                }
            }
        }
        Ok(())
    }

    /// Enforces the handshake timeout. Call periodically.
    ///
    /// On expiry the frame is removed, the session becomes `FAILED` and
    /// `on_error` is called. The error is also returned.
    pub fn poll(&mut self) -> Option<HandshakeError> {
        let now = self.clock.now_millis();
        let timeout = self.config.handshake_timeout_ms;
        let active = self.active.as_mut()?;
        let err = active.host.check_timeout(now, timeout)?;

        warn!(session = %active.host.id(), error = %err, "checkout frame failed to connect");
        if active.mounted {
            self.surface.remove_frame(active.host.frame());
            active.mounted = false;
        }
        if let Some(f) = active.callbacks.on_error.as_mut() {
            f(&err);
        }
        Some(err)
    }
}

impl<S, C> fmt::Debug for ChannelGateway<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelGateway")
            .field("config", &self.config)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
