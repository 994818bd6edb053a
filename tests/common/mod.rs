//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use frame_handshake::clock::ManualClock;
use frame_handshake::config::GatewayConfig;
use frame_handshake::error::{HandshakeError, Result};
use frame_handshake::gateway::{ChannelGateway, EmbedSurface, FrameSpec};
use frame_handshake::protocol::checkout::CheckoutConfig;
use frame_handshake::protocol::message::{EndpointId, Origin, ScopedMessage};
use std::collections::HashSet;

/// The host window as seen from inside the frame.
pub const HOST_WINDOW: EndpointId = EndpointId(1);

pub fn host_origin() -> Origin {
    Origin::new("https://merchant.example")
}

/// An in-memory host document that records everything the gateway does.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_frame: u64,
    pub created: Vec<FrameSpec>,
    pub mounted: Vec<EndpointId>,
    pub removed: Vec<EndpointId>,
    pub loaders: HashSet<EndpointId>,
    pub outbox: Vec<(EndpointId, Origin, ScopedMessage)>,
    /// Message kind whose posts fail, to simulate a detached frame.
    pub refuse: Option<&'static str>,
}

impl RecordingSurface {
    pub fn drain(&mut self) -> Vec<(EndpointId, Origin, ScopedMessage)> {
        std::mem::take(&mut self.outbox)
    }
}

impl EmbedSurface for RecordingSurface {
    fn create_frame(&mut self, spec: &FrameSpec) -> Result<EndpointId> {
        self.next_frame += 1;
        let frame = EndpointId(100 + self.next_frame);
        self.created.push(spec.clone());
        self.mounted.push(frame);
        Ok(frame)
    }

    fn show_loader(&mut self, frame: EndpointId) {
        self.loaders.insert(frame);
    }

    fn hide_loader(&mut self, frame: EndpointId) {
        self.loaders.remove(&frame);
    }

    fn remove_frame(&mut self, frame: EndpointId) {
        self.mounted.retain(|f| *f != frame);
        self.loaders.remove(&frame);
        self.removed.push(frame);
    }

    fn post(
        &mut self,
        frame: EndpointId,
        target_origin: &Origin,
        message: &ScopedMessage,
    ) -> Result<()> {
        if self.refuse == Some(message.kind()) {
            return Err(HandshakeError::Surface(format!("{} not delivered", message.kind())));
        }
        self.outbox.push((frame, target_origin.clone(), message.clone()));
        Ok(())
    }
}

pub fn gateway(clock: &ManualClock) -> ChannelGateway<RecordingSurface, ManualClock> {
    let config = GatewayConfig::default()
        .sandbox_origin("https://sandbox.pay.example")
        .live_origin("https://pay.example");
    ChannelGateway::with_clock(config, RecordingSurface::default(), clock.clone())
        .expect("default config is valid")
}

pub fn stripe_checkout() -> CheckoutConfig {
    CheckoutConfig::direct("pk_test_1", 15000.0, "a@b.com", "+1234567890")
        .currency("USD")
        .customer_name("John", "Doe")
        .provider("STRIPE")
}
