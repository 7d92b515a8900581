use serde::{Deserialize, Serialize};

/// One extraction's view of a profile page.
///
/// `total_count == None` means the count could not be determined; an empty
/// `item_ids` means no ids were found. The two are independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub total_count: Option<u64>,
    /// Deduplicated, in first-seen order.
    #[serde(default)]
    pub item_ids: Vec<String>,
}

impl PageSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count.is_none() && self.item_ids.is_empty()
    }
}

/// Last-visit record for one identity, owned by the profile store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProfileState {
    pub last_seen_count: u64,
    /// RFC 3339 timestamp of the visit that wrote this record.
    pub last_visit_timestamp: String,
    /// Absent in records written by older builds; treated as "no usable list".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen_item_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub new_count: u64,
    pub new_item_ids: Vec<String>,
}

/// States of one scroll-capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Scrolling,
    WaitingForContent,
    PausedForDecision,
    Finished,
}

/// Resolution of a pause-for-decision prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Finish,
    Resume,
}

/// Why a capture session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureEnd {
    /// Another session already held the guard; nothing was collected.
    AlreadyRunning,
    /// The decision prompt resolved with "finish".
    Finished,
    /// The active flag was cleared from outside.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
    pub urls: Vec<String>,
    pub end: CaptureEnd,
    pub pauses: u32,
}

/// Item links reported by the page's mutation observer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MutationBatch {
    pub hrefs: Vec<String>,
}

/// Figures shown in the injected status UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub total_count: Option<u64>,
    pub new_count: u64,
}

impl StatusView {
    pub fn total_label(&self) -> String {
        match self.total_count {
            Some(n) => format!("Total Videos: {}", n),
            None => "Total Videos: N/A".to_string(),
        }
    }

    pub fn new_label(&self) -> String {
        format!("New: {}", self.new_count)
    }
}
