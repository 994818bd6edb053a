//! Host-side lifecycle tests for the channel gateway.

mod common;

use common::{HOST_WINDOW, gateway, host_origin, stripe_checkout};
use frame_handshake::clock::ManualClock;
use frame_handshake::error::{HandshakeError, Result};
use frame_handshake::gateway::Callbacks;
use frame_handshake::handshake::{EmbeddedContext, EmbeddedEvent};
use frame_handshake::protocol::message::{
    ClosedReport, Envelope, Outcome, ProgressReport, ProgressStage, ResultReport, ScopedMessage,
};
use frame_handshake::protocol::state::SessionState;
use serde_json::Map;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Seen {
    results: Vec<ResultReport>,
    closes: Vec<ClosedReport>,
    progress: Vec<ProgressReport>,
    errors: Vec<String>,
}

fn recording(seen: &Rc<RefCell<Seen>>) -> Callbacks {
    let (a, b, c, d) = (seen.clone(), seen.clone(), seen.clone(), seen.clone());
    Callbacks::new()
        .on_result(move |r| a.borrow_mut().results.push(r.clone()))
        .on_close(move |r| b.borrow_mut().closes.push(r.clone()))
        .on_progress(move |r| c.borrow_mut().progress.push(r.clone()))
        .on_error(move |e| d.borrow_mut().errors.push(e.to_string()))
}

#[test]
fn handshake_timeout_notifies_the_caller() -> Result<()> {
    let clock = ManualClock::new(0);
    let seen = Rc::new(RefCell::new(Seen::default()));
    let mut host = gateway(&clock);
    host.open(stripe_checkout(), recording(&seen))?;
    let frame = host.surface().mounted[0];

    clock.advance(9_999);
    assert!(host.poll().is_none());
    assert_eq!(host.state(), Some(SessionState::Uninitiated));

    clock.advance(1);
    let err = host.poll().expect("timeout must fire");
    assert!(matches!(err, HandshakeError::HandshakeTimeout { waited_ms: 10_000 }));
    assert_eq!(host.state(), Some(SessionState::Failed));
    assert_eq!(seen.borrow().errors.len(), 1);
    assert!(host.surface().removed.contains(&frame));
    assert!(host.surface().mounted.is_empty());

    // Reported once only.
    clock.advance(10_000);
    assert!(host.poll().is_none());
    assert_eq!(seen.borrow().errors.len(), 1);
    Ok(())
}

#[test]
fn late_messages_after_teardown_are_dropped() -> Result<()> {
    let clock = ManualClock::new(0);
    let seen = Rc::new(RefCell::new(Seen::default()));
    let mut host = gateway(&clock);
    host.open(stripe_checkout(), recording(&seen))?;
    let frame = host.surface().mounted[0];
    let origin = host.surface().created[0].origin.clone();

    let mut widget = EmbeddedContext::builder().clock(clock.clone()).build()?;
    host.handle_message(Envelope::new(frame, origin.clone(), widget.start()?))?;
    let sent = host.surface_mut().drain();
    let (_, _, ack) = sent[0].clone();
    let (_, _, payload) = sent[1].clone();
    widget.handle(Envelope::new(HOST_WINDOW, host_origin(), ack));

    // The widget goes away; the configuration is still in flight.
    widget.close();
    assert!(widget.handle(Envelope::new(HOST_WINDOW, host_origin(), payload)).is_none());
    assert!(widget.checkout().is_none());

    // The host closes; a result the frame sent earlier arrives afterwards.
    let late_result = ScopedMessage::Result(ResultReport {
        outcome: Outcome::Success,
        details: Map::new(),
    });
    host.close();
    assert!(host.state().is_none());
    host.handle_message(Envelope::new(frame, origin, late_result))?;
    assert!(seen.borrow().results.is_empty());
    assert!(seen.borrow().closes.is_empty());
    Ok(())
}

#[test]
fn reopening_tears_down_the_previous_frame() -> Result<()> {
    let clock = ManualClock::new(0);
    let first_seen = Rc::new(RefCell::new(Seen::default()));
    let second_seen = Rc::new(RefCell::new(Seen::default()));
    let mut host = gateway(&clock);

    host.open(stripe_checkout(), recording(&first_seen))?;
    let first_frame = host.surface().mounted[0];
    let origin = host.surface().created[0].origin.clone();
    let mut first_widget = EmbeddedContext::builder().clock(clock.clone()).build()?;
    host.handle_message(Envelope::new(first_frame, origin.clone(), first_widget.start()?))?;
    assert_eq!(host.state(), Some(SessionState::Trusted));
    host.surface_mut().drain();

    let first_id = host.session_id();
    host.open(stripe_checkout(), recording(&second_seen))?;
    assert_ne!(host.session_id(), first_id);
    assert_eq!(host.surface().mounted.len(), 1);
    assert!(host.surface().removed.contains(&first_frame));
    let second_frame = host.surface().mounted[0];
    assert_ne!(first_frame, second_frame);

    // The superseded frame can no longer drive callbacks.
    let stale = ScopedMessage::Result(ResultReport {
        outcome: Outcome::Success,
        details: Map::new(),
    });
    host.handle_message(Envelope::new(first_frame, origin.clone(), stale))?;
    assert!(first_seen.borrow().results.is_empty());
    assert!(second_seen.borrow().results.is_empty());

    // Nor can it complete the new session's handshake.
    let mut replayed = EmbeddedContext::builder().clock(clock.clone()).build()?;
    host.handle_message(Envelope::new(first_frame, origin, replayed.start()?))?;
    assert_eq!(host.state(), Some(SessionState::Uninitiated));
    assert!(host.surface().outbox.is_empty());
    Ok(())
}

#[test]
fn close_callback_needs_a_trusted_frame() -> Result<()> {
    let clock = ManualClock::new(0);
    let seen = Rc::new(RefCell::new(Seen::default()));
    let mut host = gateway(&clock);
    host.open(stripe_checkout(), recording(&seen))?;
    let frame = host.surface().mounted[0];
    let origin = host.surface().created[0].origin.clone();

    // Before the handshake a CLOSED from the right frame is still ignored.
    let premature = ScopedMessage::Closed(ClosedReport::default());
    host.handle_message(Envelope::new(frame, origin.clone(), premature))?;
    assert!(seen.borrow().closes.is_empty());
    assert_eq!(host.surface().mounted, vec![frame]);

    let mut widget = EmbeddedContext::builder().clock(clock.clone()).build()?;
    host.handle_message(Envelope::new(frame, origin.clone(), widget.start()?))?;
    for (_, _, message) in host.surface_mut().drain() {
        widget.handle(Envelope::new(HOST_WINDOW, host_origin(), message));
    }

    let progress = widget.report_progress(ProgressStage::CheckoutLinkCreated, Map::new())?;
    host.handle_message(Envelope::new(frame, origin.clone(), progress.message))?;
    assert_eq!(seen.borrow().progress.len(), 1);

    let closed = widget.report_closed(Map::new())?;
    host.handle_message(Envelope::new(frame, origin, closed.message))?;
    assert_eq!(seen.borrow().closes.len(), 1);
    assert!(host.surface().mounted.is_empty());
    Ok(())
}

#[test]
fn host_close_fires_no_callbacks() -> Result<()> {
    let clock = ManualClock::new(0);
    let seen = Rc::new(RefCell::new(Seen::default()));
    let mut host = gateway(&clock);
    host.open(stripe_checkout(), recording(&seen))?;
    let frame = host.surface().mounted[0];
    host.close();
    assert!(host.surface().removed.contains(&frame));
    let seen = seen.borrow();
    assert!(seen.closes.is_empty() && seen.results.is_empty() && seen.errors.is_empty());
    Ok(())
}

#[test]
fn loader_is_shown_until_checkout_ready() -> Result<()> {
    let clock = ManualClock::new(0);
    let mut host = gateway(&clock);
    host.open(stripe_checkout(), Callbacks::new())?;
    let frame = host.surface().mounted[0];
    let origin = host.surface().created[0].origin.clone();
    assert!(host.surface().loaders.contains(&frame));

    let mut widget = EmbeddedContext::builder().clock(clock.clone()).build()?;
    host.handle_message(Envelope::new(frame, origin.clone(), widget.start()?))?;
    for (_, _, message) in host.surface_mut().drain() {
        widget.handle(Envelope::new(HOST_WINDOW, host_origin(), message));
    }
    assert!(host.surface().loaders.contains(&frame));

    host.handle_message(Envelope::new(frame, origin, widget.report_ready()?.message))?;
    assert!(!host.surface().loaders.contains(&frame));
    Ok(())
}

#[test]
fn sealed_payload_carries_only_schema_fields() -> Result<()> {
    let clock = ManualClock::new(0);
    let mut host = gateway(&clock);
    let callbacks = Callbacks::new().on_result(|_| {}).on_close(|_| {});
    host.open(stripe_checkout(), callbacks)?;
    let frame = host.surface().mounted[0];
    let origin = host.surface().created[0].origin.clone();

    let mut widget = EmbeddedContext::builder().clock(clock).build()?;
    host.handle_message(Envelope::new(frame, origin, widget.start()?))?;
    let sent = host.surface_mut().drain();
    let ScopedMessage::ConfigPayload(payload) = &sent[1].2 else {
        panic!("second message must be the configuration");
    };
    let allowed = [
        "token", "ready", "timestamp", "merchantKey", "amount", "currency", "email",
        "phoneNumber", "firstName", "lastName", "provider",
    ];
    for key in payload.fields.keys() {
        assert!(allowed.contains(&key.as_str()), "unexpected field {key}");
    }

    let event = widget.handle(Envelope::new(HOST_WINDOW, host_origin(), sent[0].2.clone()));
    assert!(matches!(event, Some(EmbeddedEvent::Trusted { .. })));
    Ok(())
}

#[test]
fn invalid_open_creates_no_frame() {
    let clock = ManualClock::new(0);
    let mut host = gateway(&clock);
    let mut config = stripe_checkout();
    config.amount = Some(0.0);
    config.phone_number = None;
    let err = host.open(config, Callbacks::new()).unwrap_err();
    let HandshakeError::SchemaValidationFailed(errors) = err else {
        panic!("expected a schema failure");
    };
    assert!(errors.mentions("amount"));
    assert!(errors.mentions("phoneNumber"));
    assert!(host.surface().created.is_empty());
    assert!(host.state().is_none());
}

#[test]
fn undeliverable_config_fails_the_session() -> Result<()> {
    let clock = ManualClock::new(0);
    let seen = Rc::new(RefCell::new(Seen::default()));
    let mut host = gateway(&clock);
    host.open(stripe_checkout(), recording(&seen))?;
    host.surface_mut().refuse = Some("CONFIG_PAYLOAD");
    let frame = host.surface().mounted[0];
    let origin = host.surface().created[0].origin.clone();

    let mut widget = EmbeddedContext::builder().clock(clock.clone()).build()?;
    let init = widget.start()?;
    let err = host
        .handle_message(Envelope::new(frame, origin.clone(), init.clone()))
        .unwrap_err();
    assert!(matches!(err, HandshakeError::Surface(_)));

    // The caller hears about it once and the frame is gone.
    assert_eq!(host.state(), Some(SessionState::Failed));
    assert_eq!(seen.borrow().errors.len(), 1);
    assert!(host.surface().mounted.is_empty());
    assert!(host.surface().removed.contains(&frame));

    // Neither a retried init nor the timeout revives or re-reports it.
    host.surface_mut().refuse = None;
    host.surface_mut().drain();
    host.handle_message(Envelope::new(frame, origin, init))?;
    assert!(host.surface().outbox.is_empty());
    clock.advance(60_000);
    assert!(host.poll().is_none());
    assert_eq!(seen.borrow().errors.len(), 1);
    Ok(())
}

#[test]
fn non_finite_amount_is_reported_as_invalid() {
    let clock = ManualClock::new(0);
    let mut host = gateway(&clock);
    for amount in [f64::NAN, f64::INFINITY] {
        let mut config = stripe_checkout();
        config.amount = Some(amount);
        let err = host.open(config, Callbacks::new()).unwrap_err();
        let HandshakeError::SchemaValidationFailed(errors) = err else {
            panic!("expected a schema failure");
        };
        assert_eq!(errors.messages(), vec!["amount: must be a positive number".to_owned()]);
    }
    assert!(host.surface().created.is_empty());
}
