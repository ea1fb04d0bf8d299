//! End-to-end routing scenarios driven through the host driver.

use alloy::primitives::{Address, U256};
use std::collections::BTreeSet;

use stream_router::router::anomaly::AnomalyKind;
use stream_router::router::clock::ManualClock;
use stream_router::router::error::RecipientFault;
use stream_router::router::metadata::encode_intent;
use stream_router::router::{RouterError, RoutingEngine, Termination};
use stream_router::streaming::{FlowRate, HostDriver, MemoryHost};

mod common;
use common::{contributor, engine_with, recipient, TOKEN};

fn rate(r: i64) -> FlowRate {
    FlowRate::from(r)
}

fn assert_balanced(engine: &RoutingEngine<MemoryHost>) {
    assert_eq!(engine.net_router_flow(), FlowRate::ZERO);
    engine.check_invariants().unwrap();
}

#[test]
fn test_lifecycle_scenarios() {
    let (c1, c2) = (contributor(1), contributor(2));
    let (x, y, z) = (recipient(1), recipient(2), recipient(3));
    let mut engine = engine_with(ManualClock::starting_at(0), &[x, z]);
    let mut host = HostDriver::new(&mut engine);

    // A: first stream opens the outbound
    host.create_stream(c1, TOKEN, rate(100), &encode_intent(x)).unwrap();
    // B: rate change follows through
    host.update_stream(c1, TOKEN, rate(200), &encode_intent(x)).unwrap();
    // C: second contributor merges into the same outbound
    host.create_stream(c2, TOKEN, rate(100), &encode_intent(x)).unwrap();
    assert_eq!(engine.flow_to_recipient(&x), rate(300));
    assert_eq!(engine.host().outgoing(common::ROUTER).len(), 1);
    assert_balanced(&engine);

    // D: termination reduces, never fails
    let mut host = HostDriver::new(&mut engine);
    assert_eq!(
        host.delete_stream(c1, TOKEN),
        Termination::Closed { recipient: x, rate: rate(200) }
    );
    assert_eq!(engine.flow_to_recipient(&x), rate(100));
    assert!(engine.ledger().get(&c1).is_none());
    assert_balanced(&engine);

    // E: unregistered recipient is rejected with no trace
    let err = HostDriver::new(&mut engine)
        .create_stream(c1, TOKEN, rate(100), &encode_intent(y))
        .unwrap_err();
    assert_eq!(err, RouterError::InvalidRecipient(RecipientFault::Unregistered(y)));
    assert!(engine.ledger().get(&c1).is_none());
    assert_eq!(engine.flow_to_recipient(&y), FlowRate::ZERO);
    assert_balanced(&engine);

    // F: switch moves the flow between recipients
    HostDriver::new(&mut engine)
        .update_stream(c2, TOKEN, rate(150), &encode_intent(z))
        .unwrap();
    assert_eq!(engine.flow_to_recipient(&x), FlowRate::ZERO);
    assert_eq!(engine.flow_to_recipient(&z), rate(150));
    assert_balanced(&engine);
}

#[test]
fn test_failed_switch_applies_neither_leg() {
    let (x, z) = (recipient(1), recipient(3));
    let mut engine = engine_with(ManualClock::starting_at(0), &[x, z]);
    HostDriver::new(&mut engine)
        .create_stream(contributor(1), TOKEN, rate(100), &encode_intent(x))
        .unwrap();
    engine.host_mut().refuse_receiver(z);

    let err = HostDriver::new(&mut engine)
        .update_stream(contributor(1), TOKEN, rate(300), &encode_intent(z))
        .unwrap_err();
    assert!(matches!(err, RouterError::PartialRouteFailure { .. }));
    assert_eq!(engine.flow_to_recipient(&x), rate(100));
    assert_eq!(engine.flow_to_recipient(&z), FlowRate::ZERO);
    assert_eq!(engine.ledger().rate_for(&contributor(1)), Some((x, rate(100))));
    assert_balanced(&engine);
}

#[test]
fn test_failed_switch_with_both_recipients_refusing() {
    let (x, z) = (recipient(1), recipient(3));
    let mut engine = engine_with(ManualClock::starting_at(0), &[x, z]);
    HostDriver::new(&mut engine)
        .create_stream(contributor(1), TOKEN, rate(100), &encode_intent(x))
        .unwrap();
    engine.host_mut().refuse_receiver(x);
    engine.host_mut().refuse_receiver(z);

    let err = HostDriver::new(&mut engine)
        .update_stream(contributor(1), TOKEN, rate(100), &encode_intent(z))
        .unwrap_err();
    assert!(matches!(err, RouterError::PartialRouteFailure { .. }));
    assert_eq!(engine.flow_to_recipient(&x), rate(100));
    assert_eq!(engine.flow_to_recipient(&z), FlowRate::ZERO);
    assert!(engine.anomalies().is_empty());
    assert_balanced(&engine);
}

#[test]
fn test_termination_always_acknowledges() {
    let x = recipient(1);
    let mut engine = engine_with(ManualClock::starting_at(0), &[x]);
    let mut host = HostDriver::new(&mut engine);
    host.create_stream(contributor(1), TOKEN, rate(70), &encode_intent(x)).unwrap();
    host.create_stream(contributor(2), TOKEN, rate(30), &encode_intent(x)).unwrap();
    engine.host_mut().refuse_receiver(x);

    let termination = HostDriver::new(&mut engine).delete_stream(contributor(1), TOKEN);
    assert_eq!(termination, Termination::Degraded { recipient: x, rate: rate(70) });
    assert!(engine.ledger().get(&contributor(1)).is_none());

    let kinds: BTreeSet<&str> = engine.anomalies().iter().map(|a| a.kind.as_str()).collect();
    assert!(kinds.contains(AnomalyKind::CompensationFailed.as_str()));
    assert!(kinds.contains(AnomalyKind::InvariantDrift.as_str()));

    // the recipient recovers; closing the last stream reconciles everything
    engine.host_mut().accept_receiver(x);
    HostDriver::new(&mut engine).delete_stream(contributor(2), TOKEN);
    assert_eq!(engine.flow_to_recipient(&x), FlowRate::ZERO);
    assert_balanced(&engine);

    // unknown contributor and foreign token are acknowledged too
    let mut host = HostDriver::new(&mut engine);
    assert_eq!(host.delete_stream(contributor(9), TOKEN), Termination::Ignored);
    assert_eq!(
        host.delete_stream(contributor(9), Address::with_last_byte(0xee)),
        Termination::Ignored
    );
}

#[test]
fn test_contributions_follow_time() {
    let (x, z) = (recipient(1), recipient(3));
    let clock = ManualClock::starting_at(1_000);
    let mut engine = engine_with(clock.clone(), &[x, z]);

    HostDriver::new(&mut engine)
        .create_stream(contributor(1), TOKEN, rate(10), &encode_intent(x))
        .unwrap();
    clock.advance(60);
    HostDriver::new(&mut engine)
        .create_stream(contributor(2), TOKEN, rate(5), &encode_intent(x))
        .unwrap();
    clock.advance(40);
    HostDriver::new(&mut engine)
        .update_stream(contributor(1), TOKEN, rate(10), &encode_intent(z))
        .unwrap();
    clock.advance(20);

    // c1: 10 * 100 to x, 10 * 20 to z. c2: 5 * 60 to x.
    assert_eq!(engine.total_contributed(&x), U256::from(1_000 + 300));
    assert_eq!(engine.total_contributed(&z), U256::from(200));
    assert_eq!(
        engine.contributors_for(&x),
        BTreeSet::from([contributor(1), contributor(2)])
    );
    assert_eq!(engine.contributors_for(&z), BTreeSet::from([contributor(1)]));
}

#[test]
fn test_random_sequences_keep_router_balanced() {
    let recipients = [recipient(1), recipient(2), recipient(3)];
    let contributors: Vec<Address> = (1..=6).map(contributor).collect();
    let clock = ManualClock::starting_at(0);
    let mut engine = engine_with(clock.clone(), &recipients);
    let mut rng = fastrand::Rng::with_seed(0x5eed);

    for _ in 0..500 {
        clock.advance(rng.u64(0..10));
        let who = contributors[rng.usize(..contributors.len())];
        let target = recipients[rng.usize(..recipients.len())];
        let flow = rate(rng.i64(1..1_000));
        let mut host = HostDriver::new(&mut engine);

        match rng.u8(0..3) {
            0 => {
                let _ = host.create_stream(who, TOKEN, flow, &encode_intent(target));
            }
            1 => {
                let metadata = if rng.bool() { encode_intent(target) } else { Vec::new() };
                let _ = host.update_stream(who, TOKEN, flow, &metadata);
            }
            _ => {
                host.delete_stream(who, TOKEN);
            }
        }

        assert_balanced(&engine);
        for r in &recipients {
            assert_eq!(engine.flow_to_recipient(r), engine.ledger().total_for(r));
        }
    }
}
