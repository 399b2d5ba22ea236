//! Window classification: tab resolution, subframe collapsing and the
//! display-group ranks used for default ordering.

use crate::model::{ProcessType, RawProcessSample, WindowView};
use crate::provider::WindowRegistry;
use std::collections::HashMap;
use url::Url;

pub const RANK_BROWSER: u8 = 0;
pub const RANK_WEB_TABS: u8 = 1;
pub const RANK_WEB_FRAMES: u8 = 2;
pub const RANK_UTILITY: u8 = 3;
pub const RANK_PREALLOCATED: u8 = 4;

/// Scheme, host and port of a URI (`https://example.com:8443`).
///
/// URIs with an empty authority keep `scheme://` (`file://`), those without
/// one keep only their scheme (`about:`); unparseable ones are returned
/// unchanged.
pub fn pre_path(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(url) => match url.host_str() {
            Some(host) => match url.port() {
                Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
                None => format!("{}://{}", url.scheme(), host),
            },
            None if url.has_authority() => format!("{}://", url.scheme()),
            None => format!("{}:", url.scheme()),
        },
        Err(_) => uri.to_string(),
    }
}

/// Scheme of a URI, or an empty string when it does not parse.
pub fn scheme(uri: &str) -> String {
    Url::parse(uri)
        .map(|url| url.scheme().to_string())
        .unwrap_or_default()
}

/// Resolve the windows of a process and fold same-origin bare subframes.
///
/// Windows owned by a tab or an extension are always kept. Every other
/// window is grouped by [`pre_path`]: the first one seen stays in the list
/// and counts the others.
pub fn classify(process: &RawProcessSample, registry: &dyn WindowRegistry) -> Vec<WindowView> {
    let mut result: Vec<WindowView> = Vec::with_capacity(process.windows.len());
    let mut collapsible: HashMap<String, usize> = HashMap::new();

    for win in &process.windows {
        let tab = registry.resolve(win.outer_window_id);
        let addon = if process.process_type == ProcessType::Extension {
            registry.addon_for_uri(&win.document_uri)
        } else {
            None
        };
        let display_rank = if tab.is_some() {
            1
        } else if win.is_process_root {
            2
        } else if !win.document_title.is_empty() {
            3
        } else {
            4
        };
        let view = WindowView {
            outer_window_id: win.outer_window_id,
            document_uri: win.document_uri.clone(),
            document_title: win.document_title.clone(),
            is_process_root: win.is_process_root,
            is_in_process: win.is_in_process,
            tab,
            addon,
            count: 1,
            display_rank,
        };

        if view.tab.is_some() || view.addon.is_some() {
            result.push(view);
            continue;
        }
        let origin = pre_path(&view.document_uri);
        match collapsible.get(&origin) {
            Some(&slot) => result[slot].count += 1,
            None => {
                collapsible.insert(origin, result.len());
                result.push(view);
            }
        }
    }
    result
}

/// Group rank of a process: browser, web tabs, web frames, other special
/// processes, then preallocated ones.
pub fn display_group_rank(process_type: &ProcessType, windows: &[WindowView]) -> u8 {
    let has_tab = windows.iter().any(|w| w.tab.is_some());
    match process_type {
        ProcessType::Browser => RANK_BROWSER,
        ProcessType::WebIsolated | ProcessType::WebServiceWorker | ProcessType::WithCoopCoep => {
            if has_tab {
                RANK_WEB_TABS
            } else {
                RANK_WEB_FRAMES
            }
        }
        ProcessType::Preallocated => RANK_PREALLOCATED,
        // A bare "web" process without windows is still loading or is a
        // preallocated one in disguise.
        ProcessType::Web => {
            if has_tab {
                RANK_WEB_TABS
            } else if !windows.is_empty() {
                RANK_WEB_FRAMES
            } else {
                RANK_PREALLOCATED
            }
        }
        _ => RANK_UTILITY,
    }
}

/// Title shared by every titled window, if there is exactly one distinct title.
pub fn common_title(windows: &[WindowView]) -> Option<String> {
    let mut title: Option<&str> = None;
    for win in windows.iter().filter(|w| !w.document_title.is_empty()) {
        match title {
            None => title = Some(&win.document_title),
            Some(seen) if seen == win.document_title => {}
            Some(_) => return None,
        }
    }
    title.map(str::to_string)
}
