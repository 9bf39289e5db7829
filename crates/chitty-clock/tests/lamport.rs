//! Behavioural tests for the Lamport clock.
//!
//! The relay depends on two guarantees: the clock never goes backwards,
//! and every `receive` hands out a value strictly greater than anything
//! seen before. These tests walk mixed sequences of operations and check
//! both after every step.

use chitty_clock::LamportClock;

/// One step in a scripted clock history.
#[derive(Debug, Clone, Copy)]
enum Op {
    Tick,
    Observe(u64),
    Receive(u64),
}

fn apply(clock: &mut LamportClock, op: Op) -> Option<u64> {
    match op {
        Op::Tick => Some(clock.tick()),
        Op::Observe(remote) => {
            clock.observe(remote);
            None
        }
        Op::Receive(remote) => Some(clock.receive(remote)),
    }
}

#[test]
fn test_receive_is_strictly_greater_than_prior_and_remote() {
    let mut clock = LamportClock::new();
    clock.tick();
    clock.tick(); // now 2

    // Remote behind us.
    let before = clock.now();
    let stamped = clock.receive(1);
    assert!(stamped > before);
    assert!(stamped > 1);

    // Remote ahead of us.
    let before = clock.now();
    let stamped = clock.receive(40);
    assert!(stamped > before);
    assert_eq!(stamped, 41);

    // Remote equal to us.
    let before = clock.now();
    let stamped = clock.receive(before);
    assert_eq!(stamped, before + 1);
}

#[test]
fn test_mixed_history_is_monotonic() {
    let script = [
        Op::Tick,
        Op::Receive(0),
        Op::Observe(3),
        Op::Tick,
        Op::Receive(100),
        Op::Observe(50),
        Op::Receive(7),
        Op::Tick,
        Op::Observe(101),
        Op::Receive(101),
    ];

    let mut clock = LamportClock::new();
    let mut last_now = clock.now();
    let mut last_stamp = 0;

    for op in script {
        let stamp = apply(&mut clock, op);

        assert!(
            clock.now() >= last_now,
            "clock went backwards on {op:?}: {last_now} -> {}",
            clock.now()
        );
        last_now = clock.now();

        if let Some(stamp) = stamp {
            assert!(stamp > last_stamp, "stamp {stamp} not after {last_stamp}");
            if let Op::Receive(remote) = op {
                assert!(stamp > remote);
            }
            last_stamp = stamp;
        }
    }

    assert_eq!(clock.now(), 104);
}

#[test]
fn test_join_then_join_gets_consecutive_times() {
    // Two joins in a row: "A connected at 1", "B connected at 2".
    let mut clock = LamportClock::new();
    assert_eq!(clock.tick(), 1);
    assert_eq!(clock.tick(), 2);
}
