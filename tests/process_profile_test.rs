mod common;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{init_logger, FakePage};
use profile_scout::presentation::{LogPresenter, Presenter, TabBar};
use profile_scout::profile_store::{JsonFileStore, MemoryStore, ProfileStore, StoreError};
use profile_scout::tools::{ProcessOutcome, ProfileProcessor};
use profile_scout::{PageDataExtractor, PersistedProfileState, StatusView};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn ids(range: std::ops::RangeInclusive<u32>) -> Vec<String> {
    range.map(|i| format!("v{}", i)).collect()
}

fn hydration(handle: &str, count: Option<u64>, item_ids: &[String]) -> Value {
    let items: Vec<Value> = item_ids.iter().map(|id| json!({ "id": id })).collect();
    let mut user_info = json!({
        "user": { "uniqueId": handle, "nickname": handle },
        "itemList": items,
    });
    if let Some(c) = count {
        user_info["stats"] = json!({ "videoCount": c, "followerCount": 99 });
    }
    json!({ "__DEFAULT_SCOPE__": { "webapp.user-detail": { "userInfo": user_info } } })
}

fn visit(count: u64, seen: Vec<String>) -> PersistedProfileState {
    PersistedProfileState {
        last_seen_count: count,
        last_visit_timestamp: "2024-06-01T08:00:00.000Z".into(),
        seen_item_ids: Some(seen),
    }
}

fn processor(store: Arc<dyn ProfileStore>, presenter: Arc<dyn Presenter>) -> ProfileProcessor {
    ProfileProcessor::new(PageDataExtractor::default(), store, presenter)
}

#[tokio::test]
async fn alice_sees_two_new_videos() {
    init_logger();
    let store = Arc::new(MemoryStore::with_record("alice", visit(10, ids(1..=10))));
    let presenter = Arc::new(LogPresenter::new());
    let page = FakePage::profile("alice").with_hydration(hydration("alice", Some(12), &ids(1..=12)));
    let processor = processor(store.clone(), presenter.clone());

    let ProcessOutcome::Processed(report) = processor.process(&page).await else {
        panic!("expected a processed cycle");
    };

    assert_eq!(report.identity, "alice");
    assert_eq!(report.result.new_count, 2);
    assert_eq!(report.result.new_item_ids, ids(11..=12));
    assert!(report.stored);

    assert_eq!(
        presenter.shown(),
        Some(StatusView {
            total_count: Some(12),
            new_count: 2
        })
    );
    assert_eq!(presenter.highlighted(), ids(11..=12));
    assert_eq!(processor.new_item_ids(), ids(11..=12));
    assert_eq!(processor.last_identity().as_deref(), Some("alice"));

    let stored = store.get("alice").await.unwrap().unwrap();
    assert_eq!(stored.last_seen_count, 12);
    assert_eq!(stored.seen_item_ids, Some(ids(1..=12)));
    assert_ne!(stored.last_visit_timestamp, "2024-06-01T08:00:00.000Z");
}

#[tokio::test]
async fn first_visit_then_nothing_new_with_file_store() {
    init_logger();
    let dir = std::env::temp_dir().join(format!("profile-scout-e2e-{}", uuid::Uuid::new_v4()));
    let store = Arc::new(JsonFileStore::new(dir.join("profiles.json")));
    let presenter = Arc::new(LogPresenter::new());
    let page = FakePage::profile("carol").with_hydration(hydration("carol", Some(3), &ids(1..=3)));
    let processor = processor(store.clone(), presenter.clone());

    let ProcessOutcome::Processed(first) = processor.process(&page).await else {
        panic!("expected a processed cycle");
    };
    assert_eq!(first.result.new_item_ids, ids(1..=3));
    assert_eq!(first.result.new_count, 3);

    let ProcessOutcome::Processed(second) = processor.process(&page).await else {
        panic!("expected a processed cycle");
    };
    assert!(second.result.new_item_ids.is_empty());
    assert_eq!(second.result.new_count, 0);
    assert_eq!(presenter.shown().unwrap().new_label(), "New: 0");

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn missing_count_leaves_stored_state_alone() {
    init_logger();
    let before = visit(10, ids(1..=10));
    let store = Arc::new(MemoryStore::with_record("alice", before.clone()));
    let presenter = Arc::new(LogPresenter::new());
    let page = FakePage::profile("alice").with_hydration(hydration("alice", None, &ids(1..=11)));
    let processor = processor(store.clone(), presenter.clone());

    let ProcessOutcome::Processed(report) = processor.process(&page).await else {
        panic!("expected a processed cycle");
    };
    assert!(!report.stored);
    assert_eq!(report.result.new_item_ids, ids(11..=11));
    assert_eq!(presenter.shown().unwrap().total_label(), "Total Videos: N/A");
    assert_eq!(store.get("alice").await.unwrap(), Some(before));
}

#[tokio::test]
async fn leaving_the_profile_clears_ui_and_state() {
    init_logger();
    let store = Arc::new(MemoryStore::new());
    let presenter = Arc::new(LogPresenter::new());
    let page = FakePage::profile("alice").with_hydration(hydration("alice", Some(2), &ids(1..=2)));
    let processor = processor(store, presenter.clone());

    assert!(matches!(processor.process(&page).await, ProcessOutcome::Processed(_)));
    assert!(presenter.shown().is_some());

    page.navigate("https://www.tiktok.com/foryou", None);
    assert_eq!(processor.process(&page).await, ProcessOutcome::NotAProfile);
    assert!(presenter.shown().is_none());
    assert!(processor.new_item_ids().is_empty());
    assert_eq!(processor.last_identity(), None);
}

#[tokio::test]
async fn switching_profiles_resets_new_ids() {
    init_logger();
    let store = Arc::new(MemoryStore::new());
    let presenter = Arc::new(LogPresenter::new());
    let page = FakePage::profile("alice").with_hydration(hydration("alice", Some(2), &ids(1..=2)));
    let processor = processor(store.clone(), presenter.clone());
    processor.process(&page).await;

    page.navigate(
        "https://www.tiktok.com/@bob",
        Some(hydration("bob", Some(1), &["b1".to_string()])),
    );
    let ProcessOutcome::Processed(report) = processor.process(&page).await else {
        panic!("expected a processed cycle");
    };
    assert_eq!(report.identity, "bob");
    assert_eq!(processor.new_item_ids(), vec!["b1".to_string()]);
    assert_eq!(presenter.highlighted(), vec!["b1".to_string()]);
    assert!(store.get("alice").await.unwrap().is_some());
    assert!(store.get("bob").await.unwrap().is_some());
}

#[tokio::test]
async fn no_tab_bar_means_no_cycle() {
    let store = Arc::new(MemoryStore::new());
    let page = FakePage::profile("alice").with_hydration(hydration("alice", Some(2), &ids(1..=2)));
    let processor = processor(store.clone(), Arc::new(LogPresenter::without_tab_bar()));

    assert_eq!(processor.process(&page).await, ProcessOutcome::NoTabBar);
    assert!(store.get("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn unreadable_page_degrades_to_empty_snapshot() {
    let store = Arc::new(MemoryStore::with_record("alice", visit(4, ids(1..=4))));
    let page = FakePage::profile("alice");
    page.dom().fail_content = true;
    let processor = processor(store.clone(), Arc::new(LogPresenter::new()));

    let ProcessOutcome::Processed(report) = processor.process(&page).await else {
        panic!("expected a processed cycle");
    };
    assert!(report.snapshot.is_empty());
    assert_eq!(report.result.new_count, 0);
    assert!(!report.stored);
    assert_eq!(store.get("alice").await.unwrap(), Some(visit(4, ids(1..=4))));
}

// ── Failing collaborators ────────────────────────────────────────────────────

/// Locates the tab bar but refuses to draw.
struct BrokenPresenter {
    inner: LogPresenter,
}

#[async_trait]
impl Presenter for BrokenPresenter {
    async fn locate_tab_bar(&self) -> Result<Option<TabBar>> {
        self.inner.locate_tab_bar().await
    }
    async fn inject_status_ui(&self, _tab_bar: &TabBar, _view: &StatusView) -> Result<()> {
        Err(anyhow!("tab bar detached"))
    }
    async fn remove_status_ui(&self) -> Result<()> {
        self.inner.remove_status_ui().await
    }
    async fn has_status_ui(&self) -> Result<bool> {
        self.inner.has_status_ui().await
    }
    async fn apply_highlight(&self, ids: &[String]) -> Result<usize> {
        self.inner.apply_highlight(ids).await
    }
}

struct BrokenStore;

#[async_trait]
impl ProfileStore for BrokenStore {
    async fn get(&self, _identity: &str) -> Result<Option<PersistedProfileState>, StoreError> {
        Err(StoreError::NoHomeDir)
    }
    async fn set(&self, _identity: &str, _state: PersistedProfileState) -> Result<(), StoreError> {
        Err(StoreError::NoHomeDir)
    }
    async fn remove(&self, _identity: &str) -> Result<bool, StoreError> {
        Err(StoreError::NoHomeDir)
    }
}

/// Delays reads so a second cycle can start while the first is in flight.
struct SlowStore {
    inner: MemoryStore,
}

#[async_trait]
impl ProfileStore for SlowStore {
    async fn get(&self, identity: &str) -> Result<Option<PersistedProfileState>, StoreError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.inner.get(identity).await
    }
    async fn set(&self, identity: &str, state: PersistedProfileState) -> Result<(), StoreError> {
        self.inner.set(identity, state).await
    }
    async fn remove(&self, identity: &str) -> Result<bool, StoreError> {
        self.inner.remove(identity).await
    }
}

#[tokio::test]
async fn presentation_failure_fails_the_cycle_without_persisting() {
    init_logger();
    let before = visit(10, ids(1..=10));
    let store = Arc::new(MemoryStore::with_record("alice", before.clone()));
    let page = FakePage::profile("alice").with_hydration(hydration("alice", Some(12), &ids(1..=12)));
    let processor = processor(
        store.clone(),
        Arc::new(BrokenPresenter {
            inner: LogPresenter::new(),
        }),
    );

    assert!(matches!(processor.process(&page).await, ProcessOutcome::Failed(_)));
    assert_eq!(store.get("alice").await.unwrap(), Some(before));
}

#[tokio::test]
async fn storage_failure_is_treated_as_first_visit() {
    init_logger();
    let page = FakePage::profile("alice").with_hydration(hydration("alice", Some(3), &ids(1..=3)));
    let processor = processor(Arc::new(BrokenStore), Arc::new(LogPresenter::new()));

    let ProcessOutcome::Processed(report) = processor.process(&page).await else {
        panic!("expected a processed cycle");
    };
    assert_eq!(report.result.new_item_ids, ids(1..=3));
    assert_eq!(report.result.new_count, 3);
    assert!(!report.stored);
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycle_for_the_same_profile_is_skipped() {
    init_logger();
    let store = Arc::new(SlowStore {
        inner: MemoryStore::new(),
    });
    let page = FakePage::profile("alice").with_hydration(hydration("alice", Some(2), &ids(1..=2)));
    let processor = processor(store, Arc::new(LogPresenter::new()));
    assert!(matches!(processor.process(&page).await, ProcessOutcome::Processed(_)));

    let (first, second) = tokio::join!(processor.process(&page), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        processor.process(&page).await
    });
    assert!(matches!(first, ProcessOutcome::Processed(_)));
    assert_eq!(second, ProcessOutcome::Skipped);

    // The flag is released once the cycle ends.
    assert!(matches!(processor.process(&page).await, ProcessOutcome::Processed(_)));
}
