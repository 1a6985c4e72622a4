use super::*;
use proptest::prelude::*;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// 30s budget, 10s warning lead, 1s ticks. Same shape as production
/// (30min/5min/1s), scaled down so timelines stay readable.
fn test_config() -> GuardConfig {
    GuardConfig {
        session_timeout: ms(30_000),
        warning_lead: ms(10_000),
        tick_interval: ms(1_000),
    }
}

fn started_clock() -> (SessionClock, Instant) {
    let mut clock = SessionClock::new(test_config());
    let t0 = Instant::now();
    clock.start(t0);
    (clock, t0)
}

#[test]
fn new_clock_is_inactive_with_no_deadlines() {
    let clock = SessionClock::new(test_config());
    assert_eq!(clock.state(), GuardState::Inactive);
    assert_eq!(clock.remaining(), Duration::ZERO);
    assert!(clock.next_deadline().is_none());
}

#[test]
fn reset_while_logged_out_is_a_noop() {
    let mut clock = SessionClock::new(test_config());
    clock.reset(Instant::now());
    assert_eq!(clock.state(), GuardState::Inactive);
    assert!(clock.next_deadline().is_none());
}

#[test]
fn warning_fires_on_schedule_with_full_lead() {
    let (mut clock, t0) = started_clock();

    // Nothing before the warning threshold.
    assert!(clock.poll(t0 + ms(19_999)).is_empty());
    assert_eq!(clock.state(), GuardState::Active);

    let events = clock.poll(t0 + ms(20_000));
    assert_eq!(
        events,
        vec![GuardEvent::Warning {
            remaining: ms(10_000)
        }]
    );
    assert_eq!(clock.state(), GuardState::Warning);
    assert_eq!(clock.remaining(), ms(10_000));
}

#[test]
fn full_timeline_warns_counts_down_and_expires() {
    // Scenario: start at t=0, no activity. Warning(10s) at t=20s, one tick
    // per second down to Expired at t=30s.
    let (mut clock, t0) = started_clock();

    assert_eq!(
        clock.poll(t0 + ms(20_000)),
        vec![GuardEvent::Warning {
            remaining: ms(10_000)
        }]
    );
    for step in 1..=9u64 {
        let events = clock.poll(t0 + ms(20_000 + step * 1_000));
        assert_eq!(
            events,
            vec![GuardEvent::Warning {
                remaining: ms(10_000 - step * 1_000)
            }],
            "unexpected events at tick {step}"
        );
    }

    let events = clock.poll(t0 + ms(30_000));
    assert_eq!(events, vec![GuardEvent::Expired]);
    assert_eq!(clock.state(), GuardState::Inactive);
    assert_eq!(clock.remaining(), Duration::ZERO);

    // Nothing left to fire.
    assert!(clock.poll(t0 + ms(31_000)).is_empty());
    assert!(clock.next_deadline().is_none());
}

#[test]
fn countdown_is_strictly_decreasing_and_never_negative() {
    let (mut clock, t0) = started_clock();

    let mut remainings = Vec::new();
    let mut expired = 0;
    for t in (20_000..=31_000).step_by(500) {
        for event in clock.poll(t0 + ms(t)) {
            match event {
                GuardEvent::Warning { remaining } => remainings.push(remaining),
                GuardEvent::Expired => expired += 1,
                GuardEvent::WarningCleared => panic!("no continue was requested"),
            }
        }
    }

    assert_eq!(expired, 1);
    assert!(remainings.windows(2).all(|w| w[0] > w[1]));
    assert!(remainings
        .windows(2)
        .all(|w| w[0] - w[1] == ms(1_000)));
    assert!(remainings.iter().all(|r| !r.is_zero()));
}

#[test]
fn activity_rearms_before_the_warning_threshold() {
    // Scenario: activity every 5s keeps the session alive indefinitely.
    let (mut clock, t0) = started_clock();

    let mut now = t0;
    for _ in 0..40 {
        now += ms(5_000);
        assert!(clock.poll(now).is_empty());
        clock.on_activity(now);
    }
    assert_eq!(clock.state(), GuardState::Active);
}

#[test]
fn continue_mid_warning_rearms_the_full_budget() {
    // Scenario: continue at t=25s (5s remaining). The next warning comes a
    // full 20s later at t=45s, not at the original t=30s deadline.
    let (mut clock, t0) = started_clock();
    clock.poll(t0 + ms(20_000));
    let drained = clock.poll(t0 + ms(25_000));
    assert_eq!(clock.remaining(), ms(5_000));
    assert_eq!(drained.len(), 5);

    let cleared = clock.continue_session(t0 + ms(25_000));
    assert_eq!(cleared, Some(GuardEvent::WarningCleared));
    assert_eq!(clock.state(), GuardState::Active);
    assert_eq!(clock.remaining(), Duration::ZERO);

    assert!(clock.poll(t0 + ms(30_000)).is_empty());
    assert!(clock.poll(t0 + ms(44_999)).is_empty());
    assert_eq!(
        clock.poll(t0 + ms(45_000)),
        vec![GuardEvent::Warning {
            remaining: ms(10_000)
        }]
    );
}

#[test]
fn continue_outside_warning_is_a_noop() {
    let mut clock = SessionClock::new(test_config());
    assert_eq!(clock.continue_session(Instant::now()), None);

    let (mut clock, t0) = started_clock();
    assert_eq!(clock.continue_session(t0 + ms(1_000)), None);
    assert_eq!(clock.state(), GuardState::Active);
}

#[test]
fn activity_is_ignored_during_warning() {
    let (mut clock, t0) = started_clock();
    clock.poll(t0 + ms(20_000));

    clock.on_activity(t0 + ms(20_500));
    assert_eq!(clock.state(), GuardState::Warning);

    // The countdown keeps its original schedule.
    assert_eq!(
        clock.poll(t0 + ms(21_000)),
        vec![GuardEvent::Warning {
            remaining: ms(9_000)
        }]
    );
}

#[test]
fn stop_cancels_all_pending_deadlines() {
    // Scenario: stop at t=5s; nothing fires at the t=20s or t=30s marks.
    let (mut clock, t0) = started_clock();
    clock.stop();

    assert!(clock.poll(t0 + ms(20_000)).is_empty());
    assert!(clock.poll(t0 + ms(30_000)).is_empty());
    assert_eq!(clock.state(), GuardState::Inactive);

    // Repeated stops never fire anything either.
    clock.stop();
    clock.stop();
    assert!(clock.poll(t0 + ms(60_000)).is_empty());
}

#[test]
fn stop_during_warning_emits_nothing() {
    let (mut clock, t0) = started_clock();
    clock.poll(t0 + ms(20_000));
    clock.stop();
    assert_eq!(clock.state(), GuardState::Inactive);
    assert_eq!(clock.remaining(), Duration::ZERO);
    assert!(clock.poll(t0 + ms(30_000)).is_empty());
}

#[test]
fn expiry_fires_exactly_once_when_tick_and_deadline_coincide() {
    // The final tick and the absolute expiry deadline both land at t=30s.
    // Whichever path runs first wins; the second is a no-op.
    let (mut clock, t0) = started_clock();
    for t in (20_000..30_000).step_by(1_000) {
        clock.poll(t0 + ms(t));
    }

    let events = clock.poll(t0 + ms(30_000));
    assert_eq!(
        events.iter().filter(|e| **e == GuardEvent::Expired).count(),
        1
    );
    assert!(clock.poll(t0 + ms(30_000)).is_empty());
}

#[test]
fn one_late_poll_drains_the_whole_countdown() {
    // A single poll long past the deadline replays the warning, every tick
    // and the expiry, still with exactly one Expired and no negatives.
    let (mut clock, t0) = started_clock();
    let events = clock.poll(t0 + ms(32_000));

    assert_eq!(events.first(), Some(&GuardEvent::Warning {
        remaining: ms(10_000)
    }));
    assert_eq!(events.last(), Some(&GuardEvent::Expired));
    assert_eq!(
        events.iter().filter(|e| **e == GuardEvent::Expired).count(),
        1
    );
    assert_eq!(clock.state(), GuardState::Inactive);
}

#[test]
fn tick_larger_than_remaining_expires_instead_of_going_negative() {
    let mut clock = SessionClock::new(GuardConfig {
        session_timeout: ms(30_000),
        warning_lead: ms(10_000),
        tick_interval: ms(4_000),
    });
    let t0 = Instant::now();
    clock.start(t0);

    let mut remainings = Vec::new();
    let mut expired = false;
    for event in clock.poll(t0 + ms(32_000)) {
        match event {
            GuardEvent::Warning { remaining } => remainings.push(remaining),
            GuardEvent::Expired => expired = true,
            GuardEvent::WarningCleared => panic!("no continue was requested"),
        }
    }

    // 10s -> 6s -> 2s, then the next 4s step would go below zero.
    assert_eq!(remainings, vec![ms(10_000), ms(6_000), ms(2_000)]);
    assert!(expired);
}

#[test]
fn restart_after_expiry_arms_a_fresh_session() {
    let (mut clock, t0) = started_clock();
    clock.poll(t0 + ms(30_000));
    assert_eq!(clock.state(), GuardState::Inactive);

    let t1 = t0 + ms(40_000);
    clock.start(t1);
    assert_eq!(clock.state(), GuardState::Active);
    assert!(clock.poll(t1 + ms(19_999)).is_empty());
    assert_eq!(
        clock.poll(t1 + ms(20_000)),
        vec![GuardEvent::Warning {
            remaining: ms(10_000)
        }]
    );
}

#[test]
fn config_rejects_lead_not_shorter_than_timeout() {
    let config = GuardConfig {
        session_timeout: ms(5_000),
        warning_lead: ms(5_000),
        tick_interval: ms(1_000),
    };
    assert!(config.validate().is_err());

    let config = GuardConfig {
        session_timeout: ms(5_000),
        warning_lead: ms(6_000),
        tick_interval: ms(1_000),
    };
    assert!(config.validate().is_err());
}

#[test]
fn config_rejects_zero_intervals() {
    for (timeout, lead, tick) in [(0, 1_000, 1_000), (30_000, 0, 1_000), (30_000, 1_000, 0)] {
        let config = GuardConfig {
            session_timeout: ms(timeout),
            warning_lead: ms(lead),
            tick_interval: ms(tick),
        };
        assert!(config.validate().is_err(), "accepted {config:?}");
    }
}

proptest! {
    /// Any activity sequence with gaps strictly below the warning threshold
    /// never produces a warning or an expiry.
    #[test]
    fn activity_under_threshold_never_warns(
        gaps in proptest::collection::vec(1u64..20_000, 1..50)
    ) {
        let mut clock = SessionClock::new(test_config());
        let t0 = Instant::now();
        clock.start(t0);

        let mut now = t0;
        for gap in gaps {
            now += ms(gap);
            prop_assert!(clock.poll(now).is_empty());
            clock.on_activity(now);
        }
        prop_assert_eq!(clock.state(), GuardState::Active);
    }
}

mod driver {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    /// Short real-time config for driver wiring tests.
    fn fast_config() -> GuardConfig {
        GuardConfig {
            session_timeout: ms(400),
            warning_lead: ms(200),
            tick_interval: ms(50),
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<GuardEvent>) -> GuardEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for a guard event")
            .expect("guard task dropped the event channel")
    }

    #[tokio::test]
    async fn driver_emits_warning_ticks_then_expiry() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let guard = SessionGuard::spawn(fast_config(), event_tx).expect("valid config");
        guard.start();

        let first = next_event(&mut event_rx).await;
        assert_eq!(
            first,
            GuardEvent::Warning {
                remaining: ms(200)
            }
        );

        let mut last_remaining = ms(200);
        loop {
            match next_event(&mut event_rx).await {
                GuardEvent::Warning { remaining } => {
                    assert!(remaining < last_remaining);
                    last_remaining = remaining;
                }
                GuardEvent::Expired => break,
                GuardEvent::WarningCleared => panic!("no continue was requested"),
            }
        }
    }

    #[tokio::test]
    async fn driver_stop_suppresses_all_callbacks() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let guard = SessionGuard::spawn(fast_config(), event_tx).expect("valid config");
        guard.start();
        guard.stop();

        tokio::time::sleep(ms(600)).await;
        assert!(event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn driver_continue_clears_warning_and_reports_success() {
        // Warning after 200ms idle, with a long grace window so the asserts
        // after re-arming are not racing the next warning.
        let config = GuardConfig {
            session_timeout: ms(3_000),
            warning_lead: ms(2_800),
            tick_interval: ms(100),
        };
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let guard = SessionGuard::spawn(config, event_tx).expect("valid config");

        // Continue before any session exists is rejected.
        assert!(!guard.continue_session().await);

        guard.start();
        assert!(matches!(
            next_event(&mut event_rx).await,
            GuardEvent::Warning { .. }
        ));

        assert!(guard.continue_session().await);
        assert_eq!(next_event(&mut event_rx).await, GuardEvent::WarningCleared);

        // Re-armed: continue outside the warning window is rejected again.
        assert!(!guard.continue_session().await);
        guard.stop();
    }

    #[tokio::test]
    async fn driver_activity_keeps_session_alive() {
        // 1s idle threshold against 100ms activity gaps leaves plenty of
        // scheduling slack.
        let config = GuardConfig {
            session_timeout: ms(2_000),
            warning_lead: ms(1_000),
            tick_interval: ms(100),
        };
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let guard = SessionGuard::spawn(config, event_tx).expect("valid config");
        guard.start();

        for _ in 0..6 {
            tokio::time::sleep(ms(100)).await;
            guard.on_activity();
        }
        assert!(event_rx.try_recv().is_err());
        guard.stop();
    }

    #[tokio::test]
    async fn driver_rejects_invalid_config() {
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let config = GuardConfig {
            session_timeout: ms(100),
            warning_lead: ms(100),
            tick_interval: ms(10),
        };
        assert!(SessionGuard::spawn(config, event_tx).is_err());
    }
}
