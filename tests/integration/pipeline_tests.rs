use super::*;
use restock_watcher::Pipeline;
use restock_watcher::pipeline::SkipReason;
use tokio_util::sync::CancellationToken;

fn pipeline(harness: &Harness) -> Pipeline {
    Pipeline::new(harness.collaborators(), &test_config())
}

#[tokio::test]
async fn test_first_scan_reports_every_listing_as_added() {
    let harness = Harness::new(FakeFetcher::new(vec![
        listing("a", "€ 4,99", StockStatus::InStock),
        listing("b", "€ 5,99", StockStatus::InStock),
    ]));

    let reports = pipeline(&harness).run_full_scan(&CancellationToken::new()).await;

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert!(report.is_success());
    assert_eq!(report.added, 2);
    assert!(report.persisted);

    let events = harness.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, NotificationKind::Added);
    assert_eq!(events[0].source_group, GROUP);
    assert_eq!(events[0].items.len(), 2);

    assert_eq!(harness.store.snapshot(GROUP).unwrap().len(), 2);
}

#[tokio::test]
async fn test_rescan_without_changes_is_silent() {
    let harness = Harness::new(FakeFetcher::new(vec![listing("a", "€ 4,99", StockStatus::InStock)]));
    let pipeline = pipeline(&harness);
    let cancel = CancellationToken::new();

    pipeline.run_full_scan(&cancel).await;
    harness.notifier.clear();

    let reports = pipeline.run_full_scan(&cancel).await;
    assert!(reports[0].is_success());
    assert!(harness.notifier.events().is_empty());
    assert_eq!(reports[0].notifications_sent, 0);
}

#[tokio::test]
async fn test_price_drop_restock_and_new_listing_in_one_scan() {
    let harness = Harness::new(FakeFetcher::new(vec![
        listing("a", "€ 8,00", StockStatus::InStock),
        listing("b", "€ 5,00", StockStatus::InStock),
        listing("c", "€ 3,50", StockStatus::InStock),
    ]));
    harness.store.seed(Snapshot::new(
        GROUP,
        vec![
            listing("a", "€ 10,00", StockStatus::InStock),
            listing("b", "€ 5,00", StockStatus::OutOfStock),
        ],
    ));

    let reports = pipeline(&harness).run_full_scan(&CancellationToken::new()).await;

    assert_eq!(
        harness.notifier.kinds(),
        vec![NotificationKind::Added, NotificationKind::PriceDrop, NotificationKind::Restock]
    );
    let report = &reports[0];
    assert_eq!((report.added, report.price_drops, report.restocks), (1, 1, 1));
    assert_eq!(report.notifications_sent, 3);

    let drop = &harness.notifier.events()[1].items[0];
    assert!(drop.listing.url.ends_with("/a"));
    assert!(drop.old_price.is_some());
}

#[tokio::test]
async fn test_uncertain_catalog_entries_are_verified_before_detection() {
    let detail = FakeDetailFetcher::default();
    detail.set_page("https://www.bol.com/nl/p/b", "Op voorraad, morgen in huis");

    let store = MemoryStore::default();
    store.seed(Snapshot::new(GROUP, vec![listing("b", "€ 5,00", StockStatus::OutOfStock)]));

    let harness = Harness::with_parts(
        FakeFetcher::new(vec![listing("b", "€ 5,00", StockStatus::Unknown)]),
        detail,
        store,
    );

    let reports = pipeline(&harness).run_full_scan(&CancellationToken::new()).await;

    assert_eq!(harness.detail_fetcher.calls(), 1);
    assert_eq!(reports[0].verified, 1);
    assert_eq!(harness.notifier.kinds(), vec![NotificationKind::Restock]);

    let stored = harness.store.snapshot(GROUP).unwrap();
    assert_eq!(stored.listings()[0].in_stock, StockStatus::InStock);
}

#[tokio::test]
async fn test_failing_detail_fetches_resolve_to_out_of_stock() {
    let harness = Harness::with_parts(
        FakeFetcher::new(vec![
            listing("a", "€ 4,99", StockStatus::Unknown),
            listing("b", "€ 4,99", StockStatus::Unknown),
            listing("c", "€ 4,99", StockStatus::InStock),
        ]),
        FakeDetailFetcher::failing(),
        MemoryStore::default(),
    );

    let reports = pipeline(&harness).run_full_scan(&CancellationToken::new()).await;

    let report = &reports[0];
    assert!(report.is_success());
    assert_eq!(report.fallback, 2);
    // one attempt plus one retry for each uncertain listing
    assert_eq!(harness.detail_fetcher.calls(), 4);

    let stored = harness.store.snapshot(GROUP).unwrap();
    let out_of_stock = stored
        .listings()
        .iter()
        .filter(|l| l.in_stock == StockStatus::OutOfStock)
        .count();
    assert_eq!(out_of_stock, 2);
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn test_fetch_failure_keeps_previous_snapshot() {
    let previous = Snapshot::new(GROUP, vec![listing("a", "€ 4,99", StockStatus::InStock)]);
    let harness = Harness::new(FakeFetcher::new(Vec::new()));
    harness.store.seed(previous.clone());
    harness.fetcher.set_failing(true);

    let reports = pipeline(&harness).run_full_scan(&CancellationToken::new()).await;

    assert!(reports[0].is_success());
    assert_eq!(reports[0].skipped, Some(SkipReason::FetchFailed));
    assert!(!reports[0].persisted);
    assert!(harness.notifier.events().is_empty());
    assert_eq!(harness.store.snapshot(GROUP).unwrap(), previous);
}

#[tokio::test]
async fn test_excluded_titles_never_reach_the_snapshot() {
    let mut sleeves = listing("sleeves", "€ 2,99", StockStatus::InStock);
    sleeves.title = "Card sleeves".to_string();
    let harness = Harness::new(FakeFetcher::new(vec![
        sleeves,
        listing("a", "€ 4,99", StockStatus::InStock),
    ]));

    let reports = pipeline(&harness).run_full_scan(&CancellationToken::new()).await;

    assert_eq!(reports[0].fetched, 2);
    assert_eq!(reports[0].added, 1);
    assert_eq!(harness.store.snapshot(GROUP).unwrap().len(), 1);
}

#[tokio::test]
async fn test_persist_failure_fails_the_pass_after_notifying() {
    let harness = Harness::with_parts(
        FakeFetcher::new(vec![listing("a", "€ 4,99", StockStatus::InStock)]),
        FakeDetailFetcher::default(),
        MemoryStore::failing_persist(),
    );

    let reports = pipeline(&harness).run_full_scan(&CancellationToken::new()).await;

    assert!(!reports[0].is_success());
    assert!(reports[0].error.is_some());
    assert!(!reports[0].persisted);
    assert_eq!(harness.notifier.kinds(), vec![NotificationKind::Added]);
}

#[tokio::test]
async fn test_stock_check_reports_restocks_only() {
    let harness = Harness::new(FakeFetcher::new(Vec::new()));
    harness.detail_fetcher.set_page("https://www.bol.com/nl/p/a", "Direct leverbaar");
    harness.detail_fetcher.set_page("https://www.bol.com/nl/p/b", "Direct leverbaar");
    harness.store.seed(Snapshot::new(
        GROUP,
        vec![
            priority_listing("a", "€ 10,00", StockStatus::OutOfStock),
            listing("b", "€ 10,00", StockStatus::OutOfStock),
        ],
    ));

    // Tick 1 is not a regular tick, so only the priority listing is due
    let reports = pipeline(&harness).run_stock_check(1, &CancellationToken::new()).await;

    assert_eq!(harness.fetcher.calls(), 0);
    assert_eq!(harness.detail_fetcher.calls(), 1);
    assert_eq!(reports[0].restocks, 1);

    let events = harness.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, NotificationKind::Restock);
    assert!(events[0].items[0].listing.url.ends_with("/a"));

    let stored = harness.store.snapshot(GROUP).unwrap();
    let b = stored.listings().iter().find(|l| l.url.ends_with("/b")).unwrap();
    assert_eq!(b.in_stock, StockStatus::OutOfStock);
}

#[tokio::test]
async fn test_stock_check_on_regular_tick_covers_every_listing() {
    let harness = Harness::new(FakeFetcher::new(Vec::new()));
    harness.store.seed(Snapshot::new(
        GROUP,
        vec![
            priority_listing("a", "€ 10,00", StockStatus::OutOfStock),
            listing("b", "€ 10,00", StockStatus::Unknown),
        ],
    ));

    let reports = pipeline(&harness).run_stock_check(0, &CancellationToken::new()).await;

    assert_eq!(harness.detail_fetcher.calls(), 2);
    assert_eq!(reports[0].restocks, 0);
    assert!(harness.notifier.events().is_empty());
}

#[tokio::test]
async fn test_stock_check_without_snapshot_waits_for_full_scan() {
    let harness = Harness::new(FakeFetcher::new(Vec::new()));

    let reports = pipeline(&harness).run_stock_check(0, &CancellationToken::new()).await;

    assert_eq!(reports[0].skipped, Some(SkipReason::NoSnapshot));
    assert_eq!(harness.detail_fetcher.calls(), 0);
    assert!(harness.store.snapshot(GROUP).is_none());
}

#[tokio::test]
async fn test_cancelled_stock_check_leaves_listings_unchanged() {
    let harness = Harness::new(FakeFetcher::new(Vec::new()));
    harness.store.seed(Snapshot::new(
        GROUP,
        vec![priority_listing("a", "€ 10,00", StockStatus::OutOfStock)],
    ));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let reports = pipeline(&harness).run_stock_check(1, &cancel).await;

    assert_eq!(reports[0].cancelled, 1);
    assert_eq!(harness.detail_fetcher.calls(), 0);
    let stored = harness.store.snapshot(GROUP).unwrap();
    assert_eq!(stored.listings()[0].in_stock, StockStatus::OutOfStock);
}
