use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use profile_scout::clipboard::{CdpClipboard, Clipboard, StdoutClipboard};
use profile_scout::config::load_scout_config_from;
use profile_scout::copy_urls::{copy_all, copy_new, CopyStatus};
use profile_scout::decision::{DecisionPrompt, ScriptedPrompt, TerminalPrompt};
use profile_scout::live_page::LivePage;
use profile_scout::presentation::{CdpPresenter, Presenter};
use profile_scout::scraping::browser_manager::BrowserSession;
use profile_scout::tools::{ProcessOutcome, ProfileProcessor};
use profile_scout::{watch, AppState};

#[derive(Parser)]
#[command(name = "profile-scout")]
#[command(about = "Track new videos on TikTok profiles and collect their URLs")]
#[command(version)]
struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract video count and ids from a profile page without a browser
    Snapshot {
        /// Profile handle, with or without the leading @
        handle: String,
        /// Read a saved HTML page instead of fetching it
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Open the profile, compare with the last visit and record this one
    Check {
        handle: String,
    },

    /// Scroll the profile to the end and print every video URL
    Capture {
        handle: String,
        /// Only the URLs of videos new since the last visit, taken from the
        /// grid as loaded (no scrolling)
        #[arg(long)]
        new_only: bool,
        /// Resume automatically this many times at a pause, then finish
        #[arg(long, value_name = "N")]
        auto_resume: Option<u32>,
        /// Write to the system clipboard through the browser instead of stdout
        #[arg(long)]
        clipboard: bool,
    },

    /// Keep a profile tab open and refresh the overlay as you browse
    Watch {
        handle: String,
    },

    /// Show the stored record for a profile
    State {
        handle: String,
    },

    /// Delete the stored record for a profile
    Forget {
        handle: String,
    },
}

fn normalize_handle(raw: &str) -> Result<String> {
    let handle = raw.trim().trim_start_matches('@');
    if handle.is_empty() || handle.contains('/') {
        bail!("invalid profile handle: {:?}", raw);
    }
    Ok(handle.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chromiumoxide=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_scout_config_from(cli.config.as_deref());

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36")
        .build()?;
    let state = AppState::new(http_client, config)?;

    match cli.command {
        Commands::Snapshot { handle, html } => snapshot(&state, &normalize_handle(&handle)?, html).await,
        Commands::Check { handle } => check(&state, &normalize_handle(&handle)?).await,
        Commands::Capture {
            handle,
            new_only,
            auto_resume,
            clipboard,
        } => capture(&state, &normalize_handle(&handle)?, new_only, auto_resume, clipboard).await,
        Commands::Watch { handle } => watch_profile(&state, &normalize_handle(&handle)?).await,
        Commands::State { handle } => {
            let handle = normalize_handle(&handle)?;
            match state.store.get(&handle).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No stored record for @{}", handle),
            }
            Ok(())
        }
        Commands::Forget { handle } => {
            let handle = normalize_handle(&handle)?;
            if state.store.remove(&handle).await? {
                println!("Forgot @{}", handle);
            } else {
                println!("No stored record for @{}", handle);
            }
            Ok(())
        }
    }
}

async fn snapshot(state: &AppState, handle: &str, html: Option<PathBuf>) -> Result<()> {
    let body = match html {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let url = state.config.site.profile_url(handle);
            info!("Fetching {}", url);
            let resp = state.http_client.get(&url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                bail!("{} returned HTTP {}", url, status);
            }
            resp.text().await?
        }
    };
    let snap = state.extractor.extract_from_html(&body, handle);
    if snap.is_empty() {
        warn!("No hydration data found for @{}", handle);
    }
    println!("{}", serde_json::to_string_pretty(&snap)?);
    Ok(())
}

fn processor_for(state: &AppState, page: Arc<dyn LivePage>) -> (ProfileProcessor, Arc<dyn Presenter>) {
    let presenter: Arc<dyn Presenter> = Arc::new(CdpPresenter::new(page));
    let processor = ProfileProcessor::new(state.extractor, state.store.clone(), presenter.clone());
    (processor, presenter)
}

async fn open_profile(state: &AppState, handle: &str, headless_default: bool) -> Result<(BrowserSession, Arc<dyn LivePage>)> {
    let session = BrowserSession::launch(&state.config, headless_default).await?;
    let url = state.config.site.profile_url(handle);
    let page: Arc<dyn LivePage> = Arc::new(session.open(&url).await?);
    Ok((session, page))
}

async fn check(state: &AppState, handle: &str) -> Result<()> {
    let (session, page) = open_profile(state, handle, true).await?;
    let (processor, _) = processor_for(state, page.clone());
    let outcome = processor.process(page.as_ref()).await;
    session.close().await;

    match outcome {
        ProcessOutcome::Processed(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        other => bail!("profile @{} was not processed: {:?}", handle, other),
    }
}

async fn capture(
    state: &AppState,
    handle: &str,
    new_only: bool,
    auto_resume: Option<u32>,
    browser_clipboard: bool,
) -> Result<()> {
    let (session, page) = open_profile(state, handle, false).await?;
    let clipboard: Box<dyn Clipboard> = if browser_clipboard {
        Box::new(CdpClipboard::new(page.clone()))
    } else {
        Box::new(StdoutClipboard)
    };

    let status = if new_only {
        copy_new_videos(state, handle, page.clone(), clipboard.as_ref()).await
    } else {
        copy_all_videos(state, page.as_ref(), auto_resume, clipboard.as_ref()).await
    };
    session.close().await;

    let status = status?;
    eprintln!("{}", status.message());
    match status {
        CopyStatus::Copied(_) | CopyStatus::NothingToCopy => Ok(()),
        CopyStatus::Busy => bail!("a capture is already running"),
        CopyStatus::Failed(reason) => bail!("copy failed: {}", reason),
    }
}

async fn copy_new_videos(
    state: &AppState,
    handle: &str,
    page: Arc<dyn LivePage>,
    clipboard: &dyn Clipboard,
) -> Result<CopyStatus> {
    let (processor, _) = processor_for(state, page.clone());
    let new_ids = match processor.process(page.as_ref()).await {
        ProcessOutcome::Processed(report) => report.result.new_item_ids,
        other => bail!("cannot determine new videos for @{}: {:?}", handle, other),
    };
    let selector = state.config.site.resolve_item_link_selector();
    Ok(copy_new(page.as_ref(), &selector, &new_ids, clipboard).await)
}

async fn copy_all_videos(
    state: &AppState,
    page: &dyn LivePage,
    auto_resume: Option<u32>,
    clipboard: &dyn Clipboard,
) -> Result<CopyStatus> {
    let prompt: Box<dyn DecisionPrompt> = match auto_resume {
        Some(n) => Box::new(ScriptedPrompt::resume_times(n)),
        None => Box::new(TerminalPrompt::new()),
    };

    let controller = Arc::new(state.capture_controller());
    let stopper = {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                controller.stop();
            }
        })
    };
    let status = copy_all(&controller, page, prompt.as_ref(), clipboard).await;
    stopper.abort();
    info!("capture: {:?}", status);
    Ok(status)
}

async fn watch_profile(state: &AppState, handle: &str) -> Result<()> {
    let (session, page) = open_profile(state, handle, false).await?;
    let (processor, presenter) = processor_for(state, page.clone());

    let result = watch::run(page, Arc::new(processor), presenter, &state.config.watch, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    session.close().await;
    result
}
