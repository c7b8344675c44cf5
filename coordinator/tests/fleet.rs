//! Whole-fleet scenarios driven through the command dispatcher

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use coordinator::core::StatusReport;
use coordinator::traits::MockFleetLauncher;
use coordinator::{Command, CoordinatorError};
use mockall::predicate::eq;
use shared::{CoordinationStore, DutyId};

mod common;
use common::{eventually, RecordingHooks, TestFixtures, TestFleet};

fn no_messages() -> RecordingHooks {
    RecordingHooks::new(Vec::new())
}

/// `check` on an empty store reports both singletons unclaimed
#[tokio::test]
async fn test_check_on_empty_store() {
    let fleet = TestFleet::new(1);
    let report = StatusReport::collect(&fleet.ctx()).await.unwrap();
    assert_eq!(report.to_string(), "CONDUCTOR:F,0 ROUTER:F,0 N:0");

    let mut coordinator = fleet.coordinator(no_messages());
    coordinator.run(Command::Check, &[]).await.unwrap();
}

/// `check` lists registered duties and duties that only have a queue
#[tokio::test]
async fn test_check_reports_claims_and_queues() {
    let fleet = TestFleet::new(3);
    let mut router = fleet.registry();
    router.establish(DutyId::Router).await.unwrap();
    fleet.store.lpush("test:duty_worker03", "m").await.unwrap();
    fleet.store.lpush("test:duty_worker03", "m").await.unwrap();
    fleet.store.lpush("test:needs", "worker01").await.unwrap();

    let report = StatusReport::collect(&fleet.ctx()).await.unwrap();
    assert_eq!(report.to_string(), "CONDUCTOR:F,0 ROUTER:T,0 W03:F,2 N:1");
}

/// Fresh start queues router plus every worker and clears routing state
#[tokio::test]
async fn test_fresh_start_fills_needs_and_clears_maps() {
    let fleet = TestFleet::new(3);
    let store = fleet.store.clone();
    store.hset("test:depths", "A", "4").await.unwrap();
    store.hset("test:workers", "A", "worker02").await.unwrap();
    store.hset("test:counts", "router", "99").await.unwrap();

    let mut conductor = fleet.coordinator(no_messages());
    let running = tokio::spawn(async move { conductor.run(Command::Start, &[]).await });

    let observed = &*fleet.store;
    eventually("needs queue to fill", || async move {
        observed.llen("test:needs").await.unwrap() == 4
    })
    .await;

    let mut needs = BTreeSet::new();
    while let Some(duty) = store.rpop("test:needs").await.unwrap() {
        needs.insert(duty);
    }
    let expected: BTreeSet<String> = ["router", "worker01", "worker02", "worker03"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(needs, expected);
    for hash in ["test:depths", "test:workers", "test:counts"] {
        assert!(store.hkeys(hash).await.unwrap().is_empty(), "{hash} should be empty");
    }

    let mut stopper = fleet.coordinator(no_messages());
    stopper.run(Command::Stop, &[]).await.unwrap();
    running.await.unwrap().unwrap();
    assert!(store.hkeys("test:processes").await.unwrap().is_empty());
}

/// A signal mid-run drops the command and still gives the duty back
#[tokio::test]
async fn test_interrupted_conductor_releases_its_duty() {
    let fleet = TestFleet::new(1);
    let (signal, received) = tokio::sync::oneshot::channel::<()>();

    let mut conductor = fleet.coordinator(no_messages());
    let interrupt = async move {
        let _ = received.await;
        "SIGTERM".to_string()
    };
    let running = tokio::spawn(async move { conductor.run_until(Command::Start, &[], interrupt).await });

    let store = &*fleet.store;
    eventually("conductor to claim its duty", || async move {
        store.hget("test:processes", "conductor").await.unwrap().is_some()
    })
    .await;

    signal.send(()).unwrap();
    let result = tokio::time::timeout(TestFixtures::PATIENCE, running)
        .await
        .expect("interrupted run should return promptly")
        .unwrap();
    match result {
        Err(CoordinatorError::Interrupted { signal }) => assert_eq!(signal, "SIGTERM"),
        other => panic!("expected Interrupted, got {other:?}"),
    }
    assert_eq!(fleet.store.hget("test:processes", "conductor").await.unwrap(), None);

    let mut restarted = fleet.coordinator(no_messages());
    let (_keep, never) = tokio::sync::oneshot::channel::<()>();
    let finished = tokio::time::timeout(
        Duration::from_millis(200),
        restarted.run_until(Command::Check, &[], async move {
            let _ = never.await;
            "SIGINT".to_string()
        }),
    )
    .await
    .expect("check should finish before any signal");
    finished.unwrap();
}

/// Start while a conductor is alive changes nothing
#[tokio::test]
async fn test_second_start_reports_already_started() {
    let fleet = TestFleet::new(1);
    let mut existing = fleet.registry();
    let owner = existing.establish(DutyId::Conductor).await.unwrap();

    let mut coordinator = fleet.coordinator(no_messages());
    coordinator.run(Command::Start, &[]).await.unwrap();
    coordinator.run(Command::Flush, &[]).await.unwrap();

    assert_eq!(
        fleet.store.hget("test:processes", "conductor").await.unwrap(),
        Some(owner.to_string())
    );
    assert_eq!(fleet.store.llen("test:needs").await.unwrap(), 0);
}

/// Full lifecycle: start, duty processes pick roles, messages flow, stop
#[tokio::test]
async fn test_fleet_lifecycle() {
    let fleet = TestFleet::new(2);
    let hooks = RecordingHooks::new(TestFixtures::interleaved_messages());
    let log = hooks.log();

    let mut conductor = fleet.coordinator(no_messages());
    let conducting = tokio::spawn(async move { conductor.run(Command::Start, &[]).await });

    let store = &*fleet.store;
    eventually("duties to be queued", || async move {
        store.llen("test:needs").await.unwrap() == 3
    })
    .await;

    let mut duties = Vec::new();
    for _ in 0..3 {
        let mut duty = fleet.coordinator(hooks.labelled("duty"));
        duties.push(tokio::spawn(async move { duty.run(Command::Duty, &[]).await }));
    }

    let observed = &*log;
    eventually("messages to be worked", || async move { observed.processed_count() == 3 }).await;
    eventually("router, two workers and the conductor to be live", || async move {
        store.hkeys("test:processes").await.unwrap().len() == 4
    })
    .await;

    let mut stopper = fleet.coordinator(no_messages());
    stopper.run(Command::Stop, &[]).await.unwrap();

    conducting.await.unwrap().unwrap();
    for duty in duties {
        duty.await.unwrap().unwrap();
    }
    assert!(store.hkeys("test:processes").await.unwrap().is_empty());
    assert_eq!(store.llen("test:needs").await.unwrap(), 0);

    let report = StatusReport::collect(&fleet.ctx()).await.unwrap();
    assert!(report.duties.iter().all(|status| !status.claimed));
}

/// Stop with no conductor alive shuts the surviving duties down directly
#[tokio::test]
async fn test_stop_without_conductor() {
    let fleet = TestFleet::new(1);
    let hooks = no_messages();
    let worker = fleet.spawn_worker(&hooks, 1);
    let store = &*fleet.store;
    eventually("worker to claim its duty", || async move {
        store.hget("test:processes", "worker01").await.unwrap().is_some()
    })
    .await;
    store.lpush("test:needs", "worker02").await.unwrap();

    let mut stopper = fleet.coordinator(no_messages());
    stopper.run(Command::Stop, &[]).await.unwrap();

    assert_eq!(worker.await.unwrap().unwrap(), 0);
    assert!(store.hkeys("test:processes").await.unwrap().is_empty());
    assert_eq!(store.llen("test:needs").await.unwrap(), 0);
}

/// Stop with nothing running is harmless
#[tokio::test]
async fn test_stop_when_not_running() {
    let fleet = TestFleet::new(1);
    let mut stopper = fleet.coordinator(no_messages());
    stopper.run(Command::Stop, &[]).await.unwrap();
    assert_eq!(fleet.store.llen("test:duty_conductor").await.unwrap(), 0);
}

/// Flush feeds only the worker queues left behind and ends once they drain
#[tokio::test]
async fn test_flush_drains_leftover_queues() {
    let fleet = TestFleet::new(3);
    let store = &*fleet.store;
    store.lpush("test:duty_worker02", "X1").await.unwrap();
    store.lpush("test:duty_worker02", "Y1").await.unwrap();

    let hooks = no_messages();
    let log = hooks.log();

    let mut conductor = fleet.coordinator(no_messages());
    let flushing = tokio::spawn(async move { conductor.run(Command::Flush, &[]).await });

    eventually("worker02 to be queued", || async move {
        store.peek_tail("test:needs").await.unwrap().as_deref() == Some("worker02")
    })
    .await;
    assert_eq!(store.llen("test:needs").await.unwrap(), 1);

    let mut duty = fleet.coordinator(hooks.labelled("duty"));
    let working = tokio::spawn(async move { duty.run(Command::Duty, &[]).await });

    tokio::time::timeout(TestFixtures::PATIENCE, flushing)
        .await
        .expect("flush should end once the backlog is empty")
        .unwrap()
        .unwrap();
    working.await.unwrap().unwrap();

    let worked: Vec<String> = log.processed().into_iter().map(|(_, message)| message).collect();
    assert_eq!(worked, vec!["X1".to_string(), "Y1".to_string()]);
    assert!(store.hkeys("test:processes").await.unwrap().is_empty());
}

/// Flush with nothing left behind returns straight away
#[tokio::test]
async fn test_flush_without_leftovers() {
    let fleet = TestFleet::new(1);
    let mut conductor = fleet.coordinator(no_messages());
    conductor.run(Command::Flush, &[]).await.unwrap();
    assert_eq!(fleet.store.llen("test:needs").await.unwrap(), 0);
    assert!(fleet.store.hkeys("test:processes").await.unwrap().is_empty());
}

/// A live router without a conductor is an inconsistent fleet
#[tokio::test]
async fn test_start_refuses_orphaned_router() {
    let fleet = TestFleet::new(1);
    let mut router = fleet.registry();
    router.establish(DutyId::Router).await.unwrap();

    let mut conductor = fleet.coordinator(no_messages());
    let err = conductor.run(Command::Start, &[]).await.unwrap_err();

    assert!(matches!(err, CoordinatorError::InvariantViolation { .. }));
    // The conductor claim was still given back
    assert_eq!(fleet.store.hget("test:processes", "conductor").await.unwrap(), None);
    assert!(fleet.store.hget("test:processes", "router").await.unwrap().is_some());
}

/// A conductor entry on the needs queue is not a duty a process can take
#[tokio::test]
async fn test_duty_rejects_unknown_request() {
    let fleet = TestFleet::new(1);
    fleet.store.lpush("test:needs", "conductor").await.unwrap();

    let mut duty = fleet.coordinator(no_messages());
    let err = duty.run(Command::Duty, &[]).await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::UnknownDutyRequest { ref request } if request == "conductor"
    ));
}

/// No assignment within the need timeout is not an error
#[tokio::test]
async fn test_duty_without_assignment() {
    let fleet = TestFleet::new(1);
    let mut duty = fleet.coordinator(no_messages());

    let started = tokio::time::Instant::now();
    duty.run(Command::Duty, &[]).await.unwrap();
    assert!(started.elapsed() >= fleet.settings.need_timeout);
    assert!(fleet.store.hkeys("test:processes").await.unwrap().is_empty());
}

/// With launching enabled the conductor asks for one process per duty
#[tokio::test]
async fn test_conductor_launches_duty_processes() {
    let fleet = TestFleet::with_settings(coordinator::Settings {
        launch_duties: true,
        ..TestFixtures::settings(2)
    });

    let mut launcher = MockFleetLauncher::new();
    launcher.expect_launch().with(eq(3)).times(1).returning(|count| Ok(count));

    let mut conductor = fleet.coordinator_with_launcher(no_messages(), Arc::new(launcher));
    let running = tokio::spawn(async move { conductor.run(Command::Start, &[]).await });

    let store = &*fleet.store;
    eventually("duties to be queued", || async move {
        store.llen("test:needs").await.unwrap() == 3
    })
    .await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    store.lpush("test:duty_conductor", TestFixtures::SENTINEL).await.unwrap();
    running.await.unwrap().unwrap();
}

/// `spawn` defaults to one process per queued need
#[tokio::test]
async fn test_spawn_uses_needs_length() {
    let fleet = TestFleet::new(1);
    fleet.store.lpush("test:needs", "router").await.unwrap();
    fleet.store.lpush("test:needs", "worker01").await.unwrap();

    let mut launcher = MockFleetLauncher::new();
    launcher.expect_launch().with(eq(2)).times(1).returning(|count| Ok(count));
    launcher.expect_launch().with(eq(5)).times(1).returning(|count| Ok(count));

    let mut coordinator = fleet.coordinator_with_launcher(no_messages(), Arc::new(launcher));
    coordinator.run(Command::Spawn, &[]).await.unwrap();
    coordinator.run(Command::Spawn, &["5".to_string()]).await.unwrap();

    let err = coordinator.run(Command::Spawn, &["many".to_string()]).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::ConfigurationError { .. }));
}
