//! Collaborators the monitor samples from: the process-info provider and
//! the window/tab registry. Both are injected so the pipeline can run
//! against synthetic data.

use crate::error::{MonitorError, Result};
use crate::model::{AddonInfo, RawProcessSample, TabInfo};
use std::collections::{HashMap, VecDeque};

/// Source of process snapshots.
///
/// Implementations return every process in one response or fail as a
/// whole; partial data must never be returned.
pub trait ProcessInfoProvider {
    fn request_snapshot(&mut self) -> Result<Vec<RawProcessSample>>;
}

/// Maps window ids to the UI tab (and extension) owning them.
pub trait WindowRegistry {
    /// Rebuild the lookup tables. Called once per update cycle.
    fn refresh(&mut self) {}

    fn resolve(&self, outer_window_id: u64) -> Option<TabInfo>;

    /// Extension owning a document, for extension processes.
    fn addon_for_uri(&self, _document_uri: &str) -> Option<AddonInfo> {
        None
    }
}

/// Provider replaying queued responses, oldest first.
#[derive(Debug, Default)]
pub struct StaticProvider {
    responses: VecDeque<Result<Vec<RawProcessSample>>>,
    requests: usize,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, samples: Vec<RawProcessSample>) {
        self.responses.push_back(Ok(samples));
    }

    pub fn push_failure(&mut self, reason: &str) {
        self.responses
            .push_back(Err(MonitorError::ProviderFailed(reason.to_string())));
    }

    /// Number of snapshot requests served so far, failed ones included.
    pub fn requests(&self) -> usize {
        self.requests
    }
}

impl ProcessInfoProvider for StaticProvider {
    fn request_snapshot(&mut self) -> Result<Vec<RawProcessSample>> {
        self.requests += 1;
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(MonitorError::ProviderFailed("no snapshot queued".to_string())))
    }
}

/// Registry backed by fixed tables.
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    tabs: HashMap<u64, TabInfo>,
    addons: Vec<(String, AddonInfo)>,
    refreshes: usize,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tab(&mut self, outer_window_id: u64, label: &str) {
        self.tabs.insert(
            outer_window_id,
            TabInfo {
                label: label.to_string(),
                image: None,
                preloaded: false,
            },
        );
    }

    pub fn insert_preloaded(&mut self, outer_window_id: u64) {
        self.tabs.insert(
            outer_window_id,
            TabInfo {
                label: String::new(),
                image: None,
                preloaded: true,
            },
        );
    }

    pub fn remove_tab(&mut self, outer_window_id: u64) {
        self.tabs.remove(&outer_window_id);
    }

    /// Documents whose URI starts with `uri_prefix` belong to this addon.
    pub fn insert_addon(&mut self, uri_prefix: &str, id: &str, name: &str) {
        self.addons.push((
            uri_prefix.to_string(),
            AddonInfo {
                id: id.to_string(),
                name: name.to_string(),
            },
        ));
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes
    }
}

impl WindowRegistry for StaticRegistry {
    fn refresh(&mut self) {
        self.refreshes += 1;
    }

    fn resolve(&self, outer_window_id: u64) -> Option<TabInfo> {
        self.tabs.get(&outer_window_id).cloned()
    }

    fn addon_for_uri(&self, document_uri: &str) -> Option<AddonInfo> {
        self.addons
            .iter()
            .find(|(prefix, _)| document_uri.starts_with(prefix.as_str()))
            .map(|(_, addon)| addon.clone())
    }
}
