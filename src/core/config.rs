use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (profile-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "PROFILE_SCOUT_CONFIG";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

pub const DEFAULT_ITEM_LINK_SELECTOR: &str = r#"div[data-e2e="user-post-item"] a[href*="/video/"], div[data-e2e="user-post-item"] a[href*="/photo/"]"#;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(key: &str) -> Option<bool> {
    let v = std::env::var(key).ok()?.trim().to_ascii_lowercase();
    match v.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Scroll-capture timing (mirrors the `capture` key in profile-scout.json).
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct CaptureConfig {
    /// Wait after each scroll-to-bottom before harvesting. Default: 3000 ms.
    pub settle_delay_ms: Option<u64>,
    /// Cooldown after the user picks "resume". Default: 15000 ms.
    pub resume_cooldown_ms: Option<u64>,
    /// Consecutive empty steps before pausing. Default: 3.
    pub stall_threshold: Option<u32>,
    /// Gap between two scroll steps. Default: 100 ms.
    pub step_gap_ms: Option<u64>,
}

impl CaptureConfig {
    /// JSON field → `PROFILE_SCOUT_SETTLE_DELAY_MS` → 3000 ms.
    pub fn resolve_settle_delay(&self) -> Duration {
        let ms = self
            .settle_delay_ms
            .or_else(|| env_parse("PROFILE_SCOUT_SETTLE_DELAY_MS"))
            .unwrap_or(3000);
        Duration::from_millis(ms)
    }

    /// JSON field → `PROFILE_SCOUT_RESUME_COOLDOWN_MS` → 15000 ms.
    pub fn resolve_resume_cooldown(&self) -> Duration {
        let ms = self
            .resume_cooldown_ms
            .or_else(|| env_parse("PROFILE_SCOUT_RESUME_COOLDOWN_MS"))
            .unwrap_or(15_000);
        Duration::from_millis(ms)
    }

    /// JSON field → `PROFILE_SCOUT_STALL_THRESHOLD` → 3. Never below 1.
    pub fn resolve_stall_threshold(&self) -> u32 {
        self.stall_threshold
            .or_else(|| env_parse("PROFILE_SCOUT_STALL_THRESHOLD"))
            .unwrap_or(3)
            .max(1)
    }

    /// JSON field → `PROFILE_SCOUT_STEP_GAP_MS` → 100 ms.
    pub fn resolve_step_gap(&self) -> Duration {
        let ms = self
            .step_gap_ms
            .or_else(|| env_parse("PROFILE_SCOUT_STEP_GAP_MS"))
            .unwrap_or(100);
        Duration::from_millis(ms)
    }
}

/// Site-specific knobs.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct SiteConfig {
    pub base_url: Option<String>,
    /// CSS selector for item links inside the profile grid.
    pub item_link_selector: Option<String>,
}

impl SiteConfig {
    /// JSON field → `PROFILE_SCOUT_BASE_URL` → `https://www.tiktok.com`.
    pub fn resolve_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| u.trim_end_matches('/').to_string())
            .or_else(|| env_string("PROFILE_SCOUT_BASE_URL"))
            .unwrap_or_else(|| "https://www.tiktok.com".to_string())
    }

    pub fn resolve_item_link_selector(&self) -> String {
        self.item_link_selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_ITEM_LINK_SELECTOR)
            .to_string()
    }

    /// Profile URL for a handle, e.g. `https://www.tiktok.com/@alice`.
    pub fn profile_url(&self, handle: &str) -> String {
        format!(
            "{}/@{}",
            self.resolve_base_url(),
            handle.trim_start_matches('@')
        )
    }
}

#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct StoreConfig {
    pub path: Option<String>,
}

impl StoreConfig {
    /// JSON field → `PROFILE_SCOUT_STATE_PATH` → `~/.profile-scout/profiles.json`.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(p) = self.path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(p));
        }
        if let Some(p) = env_string("PROFILE_SCOUT_STATE_PATH") {
            return Some(PathBuf::from(p));
        }
        let home = dirs::home_dir()?;
        Some(home.join(".profile-scout").join("profiles.json"))
    }
}

#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct WatchConfig {
    pub mutation_debounce_ms: Option<u64>,
    pub navigation_poll_ms: Option<u64>,
}

impl WatchConfig {
    /// JSON field → `PROFILE_SCOUT_MUTATION_DEBOUNCE_MS` → 500 ms.
    pub fn resolve_mutation_debounce(&self) -> Duration {
        let ms = self
            .mutation_debounce_ms
            .or_else(|| env_parse("PROFILE_SCOUT_MUTATION_DEBOUNCE_MS"))
            .unwrap_or(500);
        Duration::from_millis(ms)
    }

    /// JSON field → `PROFILE_SCOUT_NAV_POLL_MS` → 1000 ms.
    pub fn resolve_navigation_poll(&self) -> Duration {
        let ms = self
            .navigation_poll_ms
            .or_else(|| env_parse("PROFILE_SCOUT_NAV_POLL_MS"))
            .unwrap_or(1000);
        Duration::from_millis(ms)
    }
}

#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct BrowserSettings {
    pub headless: Option<bool>,
}

impl BrowserSettings {
    /// JSON field → `PROFILE_SCOUT_HEADLESS` → the caller's default.
    pub fn resolve_headless(&self, default: bool) -> bool {
        self.headless
            .or_else(|| env_flag("PROFILE_SCOUT_HEADLESS"))
            .unwrap_or(default)
    }
}

/// Top-level config loaded from `profile-scout.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
#[serde(default)]
pub struct ScoutConfig {
    pub capture: CaptureConfig,
    pub site: SiteConfig,
    pub store: StoreConfig,
    pub watch: WatchConfig,
    pub browser: BrowserSettings,
}

/// Load `profile-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `PROFILE_SCOUT_CONFIG` env var path
/// 2. `./profile-scout.json`
/// 3. `../profile-scout.json`
///
/// Missing file → `ScoutConfig::default()` (all env-var fallbacks apply).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    load_scout_config_from(None)
}

/// Like [`load_scout_config`], with an explicit path (e.g. `--config`) searched first.
pub fn load_scout_config_from(explicit: Option<&std::path::Path>) -> ScoutConfig {
    let mut candidates = vec![
        PathBuf::from("profile-scout.json"),
        PathBuf::from("../profile-scout.json"),
    ];
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }
    if let Some(path) = explicit {
        candidates.insert(0, path.to_path_buf());
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match parse_scout_config(&contents) {
            Ok(cfg) => {
                tracing::info!("profile-scout.json loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "profile-scout.json parse error at {}: {}, using defaults",
                    path.display(),
                    e
                );
                ScoutConfig::default()
            }
        };
    }

    ScoutConfig::default()
}

pub fn parse_scout_config(contents: &str) -> serde_json::Result<ScoutConfig> {
    serde_json::from_str(contents)
}

/// Optional override for the Chromium-family browser executable.
/// Only returns a value when `CHROME_EXECUTABLE` points at an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = env_string(ENV_CHROME_EXECUTABLE)?;
    if std::path::Path::new(&p).exists() {
        Some(p)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = parse_scout_config(r#"{"capture": {"settle_delay_ms": 50}}"#).unwrap();
        assert_eq!(cfg.capture.resolve_settle_delay(), Duration::from_millis(50));
        assert!(cfg.site.item_link_selector.is_none());
        assert!(cfg
            .site
            .resolve_item_link_selector()
            .contains("user-post-item"));
    }

    #[test]
    fn stall_threshold_never_zero() {
        let cfg = CaptureConfig {
            stall_threshold: Some(0),
            ..Default::default()
        };
        assert_eq!(cfg.resolve_stall_threshold(), 1);
    }

    #[test]
    fn profile_url_strips_leading_at() {
        let site = SiteConfig {
            base_url: Some("https://example.test/".into()),
            item_link_selector: None,
        };
        assert_eq!(site.profile_url("@alice"), "https://example.test/@alice");
        assert_eq!(site.profile_url("bob"), "https://example.test/@bob");
    }

    #[test]
    fn explicit_store_path_wins() {
        let store = StoreConfig {
            path: Some("/tmp/x/profiles.json".into()),
        };
        assert_eq!(
            store.resolve_path(),
            Some(PathBuf::from("/tmp/x/profiles.json"))
        );
    }
}
