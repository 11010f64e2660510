use super::*;
use restock_watcher::config::SchedulerConfig;
use restock_watcher::scheduler::TaskState;
use restock_watcher::{Pipeline, RunCoordinator, TaskKind, TriggerOutcome};
use std::time::Duration;

fn coordinator(harness: &Harness) -> RunCoordinator {
    let pipeline = Pipeline::new(harness.collaborators(), &test_config());
    RunCoordinator::new(pipeline, SchedulerConfig::default())
}

#[tokio::test]
async fn test_overlapping_trigger_is_dropped_without_fetching() {
    let gate = Gate::default();
    let harness = Harness::new(FakeFetcher::gated(
        vec![listing("a", "€ 4,99", StockStatus::InStock)],
        gate.clone(),
    ));
    let coordinator = coordinator(&harness);

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.trigger(TaskKind::FullScan).await }
    });
    gate.entered.notified().await;

    assert!(matches!(coordinator.state(TaskKind::FullScan), TaskState::Running { .. }));
    let second = coordinator.trigger(TaskKind::FullScan).await;
    assert!(matches!(second, TriggerOutcome::SkippedAlreadyRunning));
    assert_eq!(harness.fetcher.calls(), 1);

    gate.release.notify_one();
    let first = first.await.unwrap();
    assert!(matches!(first, TriggerOutcome::Completed(ref reports) if reports.len() == 1));
    assert_eq!(coordinator.state(TaskKind::FullScan), TaskState::Idle);
    assert_eq!(harness.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_stock_check_runs_while_full_scan_is_in_flight() {
    let gate = Gate::default();
    let harness = Harness::new(FakeFetcher::gated(Vec::new(), gate.clone()));
    harness.store.seed(Snapshot::new(
        GROUP,
        vec![priority_listing("a", "€ 4,99", StockStatus::OutOfStock)],
    ));
    let coordinator = coordinator(&harness);

    let scan = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.trigger(TaskKind::FullScan).await }
    });
    gate.entered.notified().await;

    let check = coordinator.trigger(TaskKind::FastStockCheck).await;
    assert!(matches!(check, TriggerOutcome::Completed(_)));
    assert_eq!(harness.detail_fetcher.calls(), 1);

    gate.release.notify_one();
    scan.await.unwrap();
}

#[tokio::test]
async fn test_last_report_is_kept_per_kind() {
    let harness = Harness::new(FakeFetcher::new(vec![listing("a", "€ 4,99", StockStatus::InStock)]));
    let coordinator = coordinator(&harness);

    assert!(coordinator.last_report(TaskKind::FullScan).is_none());
    coordinator.trigger(TaskKind::FullScan).await;

    let reports = coordinator.last_report(TaskKind::FullScan).unwrap();
    assert_eq!(reports[0].source_group, GROUP);
    assert_eq!(reports[0].added, 1);
    assert!(coordinator.last_report(TaskKind::FastStockCheck).is_none());
}

#[tokio::test]
async fn test_shutdown_waits_for_running_task() {
    let gate = Gate::default();
    let harness = Harness::new(FakeFetcher::gated(
        vec![listing("a", "€ 4,99", StockStatus::InStock)],
        gate.clone(),
    ));
    let coordinator = coordinator(&harness);

    let scan = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.trigger(TaskKind::FullScan).await }
    });
    gate.entered.notified().await;

    let release = gate.release.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        release.notify_one();
    });

    let summary = coordinator.shutdown(Duration::from_secs(5)).await;
    assert!(summary.drained);
    assert!(summary.abandoned.is_empty());

    assert!(matches!(scan.await.unwrap(), TriggerOutcome::Completed(_)));
    assert!(harness.store.snapshot(GROUP).is_some());
}

#[tokio::test]
async fn test_shutdown_abandons_task_after_grace_period() {
    let gate = Gate::default();
    let harness = Harness::new(FakeFetcher::gated(Vec::new(), gate.clone()));
    let coordinator = coordinator(&harness);

    let scan = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.trigger(TaskKind::FullScan).await }
    });
    gate.entered.notified().await;

    let summary = coordinator.shutdown(Duration::from_millis(50)).await;
    assert!(!summary.drained);
    assert_eq!(summary.abandoned, vec![TaskKind::FullScan]);

    gate.release.notify_one();
    scan.await.unwrap();
}

#[tokio::test]
async fn test_triggers_after_shutdown_are_rejected() {
    let harness = Harness::new(FakeFetcher::new(vec![listing("a", "€ 4,99", StockStatus::InStock)]));
    let coordinator = coordinator(&harness);

    let summary = coordinator.shutdown(Duration::from_millis(10)).await;
    assert!(summary.drained);

    for kind in [TaskKind::FullScan, TaskKind::FastStockCheck] {
        assert!(matches!(
            coordinator.trigger(kind).await,
            TriggerOutcome::RejectedShuttingDown
        ));
    }
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_stock_check_keeps_listings_saved_by_concurrent_full_scan() {
    let gate = Gate::default();
    let detail = FakeDetailFetcher::gated(gate.clone());
    detail.set_page("https://www.bol.com/nl/p/a", "Op voorraad");

    let store = MemoryStore::default();
    store.seed(Snapshot::new(
        GROUP,
        vec![priority_listing("a", "€ 5,00", StockStatus::OutOfStock)],
    ));

    let harness = Harness::with_parts(
        FakeFetcher::new(vec![
            listing("a", "€ 5,00", StockStatus::InStock),
            listing("b", "€ 7,50", StockStatus::InStock),
        ]),
        detail,
        store,
    );
    let coordinator = coordinator(&harness);

    // The stock check is parked inside verification of `a`
    let check = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.trigger(TaskKind::FastStockCheck).await }
    });
    gate.entered.notified().await;

    let scan = coordinator.trigger(TaskKind::FullScan).await;
    assert!(matches!(scan, TriggerOutcome::Completed(_)));
    assert_eq!(
        harness.notifier.kinds(),
        vec![NotificationKind::Added, NotificationKind::Restock]
    );
    assert_eq!(harness.store.snapshot(GROUP).unwrap().len(), 2);

    gate.release.notify_one();
    assert!(matches!(check.await.unwrap(), TriggerOutcome::Completed(_)));

    let stored = harness.store.snapshot(GROUP).unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.listings().iter().all(|l| l.in_stock == StockStatus::InStock));

    // Neither `b` nor the restock of `a` is announced a second time
    harness.notifier.clear();
    coordinator.trigger(TaskKind::FullScan).await;
    assert!(harness.notifier.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_runs_full_scan_at_once_then_stock_checks_on_interval() {
    let harness = Harness::new(FakeFetcher::new(vec![priority_listing(
        "a",
        "€ 4,99",
        StockStatus::OutOfStock,
    )]));
    let pipeline = Pipeline::new(harness.collaborators(), &test_config());
    let coordinator = RunCoordinator::new(
        pipeline,
        SchedulerConfig {
            full_scan_interval_secs: 3600,
            stock_check_interval_secs: 1,
            ..SchedulerConfig::default()
        },
    );

    coordinator.start().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while coordinator.last_report(TaskKind::FastStockCheck).is_none() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "no stock check ran within 5s of start"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let scan = coordinator.last_report(TaskKind::FullScan).unwrap();
    assert_eq!(scan[0].added, 1);
    assert_eq!(harness.fetcher.calls(), 1);
    assert!(harness.detail_fetcher.calls() >= 1);

    let summary = coordinator.shutdown(Duration::from_secs(5)).await;
    assert!(summary.drained);
    assert_eq!(harness.fetcher.calls(), 1);
}
