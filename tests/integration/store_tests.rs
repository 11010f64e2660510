use super::*;
use restock_watcher::Pipeline;
use restock_watcher::plugins::stores::{JsonFileSnapshotStore, SqliteSnapshotStore};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn collaborators(
    fetcher: Arc<FakeFetcher>,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<RecordingNotifier>,
) -> Collaborators {
    Collaborators {
        fetcher,
        detail_fetcher: Arc::new(FakeDetailFetcher::default()),
        store,
        notifier,
    }
}

/// Two scans with a fresh store instance in between, as across a restart.
async fn scan_twice(make_store: impl Fn() -> Arc<dyn SnapshotStore>) -> Vec<NotificationKind> {
    let fetcher = Arc::new(FakeFetcher::new(vec![
        listing("a", "€ 12,99", StockStatus::InStock),
        listing("b", "€ 6,49", StockStatus::OutOfStock),
    ]));
    let cancel = CancellationToken::new();

    let first = Arc::new(RecordingNotifier::default());
    Pipeline::new(collaborators(fetcher.clone(), make_store(), first.clone()), &test_config())
        .run_full_scan(&cancel)
        .await;
    assert_eq!(first.kinds(), vec![NotificationKind::Added]);

    fetcher.set_catalog(vec![
        listing("a", "€ 9,99", StockStatus::InStock),
        listing("b", "€ 6,49", StockStatus::InStock),
    ]);

    let second = Arc::new(RecordingNotifier::default());
    let reports = Pipeline::new(collaborators(fetcher, make_store(), second.clone()), &test_config())
        .run_full_scan(&cancel)
        .await;
    assert!(reports[0].is_success());
    second.kinds()
}

#[tokio::test]
async fn test_json_store_carries_state_across_restarts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshots");

    let kinds = scan_twice(|| Arc::new(JsonFileSnapshotStore::new(&path))).await;

    assert_eq!(kinds, vec![NotificationKind::PriceDrop, NotificationKind::Restock]);
    assert!(path.join("bol-com.json").exists());
}

#[tokio::test]
async fn test_sqlite_store_carries_state_across_restarts() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("snapshots.db").display());
    let store: Arc<dyn SnapshotStore> = Arc::new(SqliteSnapshotStore::connect(&url).await.unwrap());

    let kinds = scan_twice(|| store.clone()).await;

    assert_eq!(kinds, vec![NotificationKind::PriceDrop, NotificationKind::Restock]);
}
