//! Long-running watch over one tab: reprocess on navigation, and on a quiet
//! moment after the grid changes.

use super::process_profile::ProfileProcessor;
use crate::core::config::WatchConfig;
use crate::features::debounce::Debouncer;
use crate::features::presentation::Presenter;
use crate::scraping::live_page::LivePage;
use crate::scraping::location::identity_from_location;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Debounced reaction to grid mutations: re-outline remembered new ids, and
/// run a full cycle only when the page moved to another profile, left the
/// profile, or lost its status UI.
async fn on_grid_settled(page: &dyn LivePage, processor: &ProfileProcessor, presenter: &dyn Presenter) {
    let new_ids = processor.new_item_ids();
    if !new_ids.is_empty() {
        if let Err(e) = presenter.apply_highlight(&new_ids).await {
            debug!("watch: re-highlight failed: {}", e);
        }
    }

    let current = match page.location().await {
        Ok(l) => identity_from_location(&l),
        Err(e) => {
            warn!("watch: cannot read location: {}", e);
            return;
        }
    };
    let last = processor.last_identity();
    let needs_cycle = match (&current, &last) {
        (Some(cur), _) if last.as_deref() != Some(cur.as_str()) => true,
        (Some(_), _) => !presenter.has_status_ui().await.unwrap_or(false),
        (None, Some(_)) => true,
        (None, None) => false,
    };
    if needs_cycle {
        debug!("watch: grid settled, reprocessing");
        processor.process(page).await;
    }
}

pub async fn run<S>(
    page: Arc<dyn LivePage>,
    processor: Arc<ProfileProcessor>,
    presenter: Arc<dyn Presenter>,
    cfg: &WatchConfig,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()>,
{
    let outcome = processor.process(page.as_ref()).await;
    info!("watch: initial cycle → {:?}", outcome);

    let mut last_location = page.location().await.unwrap_or_default();

    let (observer, mut feed) = match page.observe_item_links().await {
        Ok(f) => (Some(f.id), Some(f.batches)),
        Err(e) => {
            warn!("watch: mutation feed unavailable, navigation polling only: {}", e);
            (None, None)
        }
    };

    let debouncer = {
        let page = page.clone();
        let processor = processor.clone();
        let presenter = presenter.clone();
        Debouncer::new(cfg.resolve_mutation_debounce(), move || {
            let page = page.clone();
            let processor = processor.clone();
            let presenter = presenter.clone();
            async move {
                on_grid_settled(page.as_ref(), &processor, presenter.as_ref()).await;
            }
        })
    };

    let mut nav = tokio::time::interval(cfg.resolve_navigation_poll());
    nav.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("watch: shutting down");
                break;
            }
            _ = nav.tick() => {
                let location = match page.location().await {
                    Ok(l) => l,
                    Err(e) => {
                        warn!("watch: cannot read location: {}", e);
                        continue;
                    }
                };
                if location != last_location {
                    info!("watch: navigated {} → {}", last_location, location);
                    last_location = location;
                    processor.reset();
                    if let Err(e) = presenter.remove_status_ui().await {
                        debug!("watch: remove UI failed: {}", e);
                    }
                    let outcome = processor.process(page.as_ref()).await;
                    debug!("watch: navigation cycle → {:?}", outcome);
                }
            }
            batch = recv_batch(&mut feed) => {
                match batch {
                    Some(_) => debouncer.trigger(),
                    None => {
                        warn!("watch: mutation feed closed");
                        feed = None;
                    }
                }
            }
        }
    }

    drop(debouncer);
    if let Some(id) = observer {
        if let Err(e) = page.disconnect_observer(id).await {
            warn!("watch: disconnect failed (non-fatal): {}", e);
        }
    }
    Ok(())
}

async fn recv_batch<T>(feed: &mut Option<tokio::sync::mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match feed {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
