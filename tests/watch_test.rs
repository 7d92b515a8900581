mod common;

use common::{init_logger, video_urls, FakePage};
use profile_scout::config::WatchConfig;
use profile_scout::live_page::LivePage;
use profile_scout::presentation::{LogPresenter, Presenter};
use profile_scout::profile_store::{MemoryStore, ProfileStore};
use profile_scout::tools::ProfileProcessor;
use profile_scout::{watch, PageDataExtractor};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn hydration(handle: &str, count: u64, ids: &[&str]) -> Value {
    let items: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
    json!({
        "__DEFAULT_SCOPE__": {
            "webapp.user-detail": {
                "userInfo": {
                    "user": { "uniqueId": handle },
                    "stats": { "videoCount": count },
                    "itemList": items
                }
            }
        }
    })
}

struct Harness {
    page: Arc<FakePage>,
    store: Arc<MemoryStore>,
    presenter: Arc<LogPresenter>,
    processor: Arc<ProfileProcessor>,
}

impl Harness {
    fn new(page: FakePage) -> Self {
        let store = Arc::new(MemoryStore::new());
        let presenter = Arc::new(LogPresenter::new());
        let processor = Arc::new(ProfileProcessor::new(
            PageDataExtractor::default(),
            store.clone(),
            presenter.clone(),
        ));
        Self {
            page: Arc::new(page),
            store,
            presenter,
            processor,
        }
    }

    async fn run_for(&self, secs: u64) -> anyhow::Result<()> {
        let cfg = WatchConfig {
            mutation_debounce_ms: Some(500),
            navigation_poll_ms: Some(1000),
        };
        let page: Arc<dyn LivePage> = self.page.clone();
        let presenter: Arc<dyn Presenter> = self.presenter.clone();
        watch::run(page, self.processor.clone(), presenter, &cfg, sleep(Duration::from_secs(secs))).await
    }
}

#[tokio::test(start_paused = true)]
async fn navigation_to_another_profile_runs_a_fresh_cycle() {
    init_logger();
    let h = Harness::new(FakePage::profile("alice").with_hydration(hydration("alice", 2, &["a1", "a2"])));

    let (result, _) = tokio::join!(h.run_for(5), async {
        sleep(Duration::from_millis(1500)).await;
        h.page
            .navigate("https://www.tiktok.com/@bob", Some(hydration("bob", 1, &["b1"])));
    });

    result.unwrap();
    assert_eq!(h.processor.last_identity().as_deref(), Some("bob"));
    assert_eq!(h.processor.new_item_ids(), vec!["b1".to_string()]);
    assert_eq!(h.presenter.shown().unwrap().total_count, Some(1));
    assert!(h.store.get("alice").await.unwrap().is_some());
    assert_eq!(h.store.get("bob").await.unwrap().unwrap().last_seen_count, 1);

    let dom = h.page.dom();
    assert_eq!(dom.observe_calls, 1);
    assert_eq!(dom.disconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn grid_changes_restore_a_missing_status_ui() {
    init_logger();
    let h = Harness::new(
        FakePage::profile("alice")
            .with_items(video_urls("alice", 1..=2))
            .with_hydration(hydration("alice", 2, &["v1", "v2"])),
    );

    let (result, _) = tokio::join!(h.run_for(5), async {
        sleep(Duration::from_millis(1200)).await;
        // The site re-rendered the header and our container went with it.
        h.presenter.remove_status_ui().await.unwrap();
        h.page.append_items(video_urls("alice", 3..=3));
    });

    result.unwrap();
    let shown = h.presenter.shown().expect("status UI restored");
    assert_eq!(shown.total_count, Some(2));
    assert_eq!(shown.new_count, 0);
    assert_eq!(h.processor.last_identity().as_deref(), Some("alice"));
}

#[tokio::test(start_paused = true)]
async fn leaving_profiles_removes_the_status_ui() {
    init_logger();
    let h = Harness::new(FakePage::profile("alice").with_hydration(hydration("alice", 2, &["a1", "a2"])));

    let (result, _) = tokio::join!(h.run_for(4), async {
        sleep(Duration::from_millis(1500)).await;
        h.page.navigate("https://www.tiktok.com/explore", None);
    });

    result.unwrap();
    assert!(h.presenter.shown().is_none());
    assert_eq!(h.processor.last_identity(), None);
}
