use crate::scraping::live_page::LivePage;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<()>;
}

/// Writes through the page's `navigator.clipboard`. Needs a focused, visible tab.
pub struct CdpClipboard {
    page: Arc<dyn LivePage>,
}

impl CdpClipboard {
    pub fn new(page: Arc<dyn LivePage>) -> Self {
        Self { page }
    }
}

#[async_trait]
impl Clipboard for CdpClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        let text_js = serde_json::to_string(text)?;
        let script = format!(
            "(async () => {{ try {{ await navigator.clipboard.writeText({}); return true; }} catch (e) {{ return String(e); }} }})()",
            text_js
        );
        let v = self.page.evaluate_json(&script).await?;
        match v.as_bool() {
            Some(true) => Ok(()),
            _ => Err(anyhow!("clipboard write rejected: {}", v)),
        }
    }
}

/// Prints the text to stdout, one URL per line.
#[derive(Debug, Default)]
pub struct StdoutClipboard;

#[async_trait]
impl Clipboard for StdoutClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        let mut out = tokio::io::stdout();
        out.write_all(text.as_bytes()).await?;
        if !text.is_empty() && !text.ends_with('\n') {
            out.write_all(b"\n").await?;
        }
        out.flush().await?;
        Ok(())
    }
}
