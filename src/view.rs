//! Keyed row registry and the incremental reconciler that turns the rows
//! requested during a cycle into the minimal set of inserts, moves and
//! removals on the displayed list.

use crate::classify::{pre_path, scheme};
use crate::config::BarScale;
use crate::format::{format_duration, format_memory, format_percent};
use crate::model::{
    CpuUsage, ProcessDelta, ProcessType, ThreadDelta, UtilityActor, WindowView,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Stable identity of a displayed row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowId {
    Process(i64),
    ThreadSummary(i64),
    Window(u64),
    Actor(i64, String),
    Thread(i64),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Process(pid) => write!(f, "p:{}", pid),
            RowId::ThreadSummary(pid) => write!(f, "ts:{}", pid),
            RowId::Window(id) => write!(f, "w:{}", id),
            RowId::Actor(pid, name) => write!(f, "u:{}{}", pid, name),
            RowId::Thread(tid) => write!(f, "t:{}", tid),
        }
    }
}

/// Identity of one row object, allocated when the row is created and never
/// reused. A row keeps its handle for as long as its key stays displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowKind {
    Process,
    ThreadSummary,
    Window,
    Actor,
    Thread,
}

/// Data the row was last filled from. Replaced every cycle.
#[derive(Debug, Clone, Default)]
pub enum RowPayload {
    #[default]
    Empty,
    Process(ProcessDelta),
    Window(WindowView),
    Actor { pid: i64, actor: UtilityActor },
    Thread(ThreadDelta),
}

impl RowPayload {
    /// Process the row belongs to, for process, thread summary and actor rows.
    pub fn pid(&self) -> Option<i64> {
        match self {
            RowPayload::Process(data) => Some(data.pid),
            RowPayload::Actor { pid, .. } => Some(*pid),
            _ => None,
        }
    }
}

impl From<ProcessDelta> for RowPayload {
    fn from(data: ProcessDelta) -> Self {
        RowPayload::Process(data)
    }
}

impl From<ThreadDelta> for RowPayload {
    fn from(data: ThreadDelta) -> Self {
        RowPayload::Thread(data)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub text: String,
    /// Hover text.
    pub title: Option<String>,
}

impl Cell {
    fn set(&mut self, text: impl Into<String>, title: Option<String>) {
        self.text = text.into();
        self.title = title;
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    handle: RowHandle,
    id: RowId,
    kind: RowKind,
    pub cells: Vec<Cell>,
    pub payload: RowPayload,
    pub hung: bool,
    pub separate_from_previous: bool,
    /// Expanded state of a thread summary. Survives refresh cycles.
    pub open: bool,
    /// CPU bar width in percent; negative means no bar.
    pub cpu_bar: f64,
    pub memory_bar: f64,
}

impl Row {
    pub fn handle(&self) -> RowHandle {
        self.handle
    }

    pub fn id(&self) -> &RowId {
        &self.id
    }

    pub fn kind(&self) -> RowKind {
        self.kind
    }
}

/// What the rendering layer needs to paint one row.
#[derive(Debug, Clone, Serialize)]
pub struct RowDescriptor {
    pub kind: RowKind,
    pub key: String,
    /// Owning process, when the row has one.
    pub pid: Option<i64>,
    pub fields: Vec<String>,
    pub titles: Vec<Option<String>>,
    pub cpu_bar: f64,
    pub memory_bar: f64,
    pub hung: bool,
    pub separate_from_previous: bool,
    pub open: bool,
}

/// Operations performed by one [`View::commit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub inserted: usize,
    pub moved: usize,
    pub removed: usize,
}

impl CommitStats {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.moved == 0 && self.removed == 0
    }
}

/// Owns every displayed row and the order they are displayed in.
#[derive(Debug)]
pub struct View {
    rows_by_id: HashMap<RowId, Row>,
    /// Displayed order.
    live: Vec<RowId>,
    /// Rows requested during the current cycle, in request order.
    ordered: Vec<RowId>,
    next_handle: u64,
    scale: BarScale,
}

impl View {
    pub fn new(scale: BarScale) -> Self {
        Self {
            rows_by_id: HashMap::new(),
            live: Vec::new(),
            ordered: Vec::new(),
            next_handle: 0,
            scale,
        }
    }

    /// Fetch the row for `id`, creating it with `cell_count` empty cells if
    /// needed, and queue it at the end of this cycle's order.
    pub fn get_or_create_row(&mut self, id: RowId, kind: RowKind, cell_count: usize) -> &mut Row {
        self.ordered.push(id.clone());
        let next_handle = &mut self.next_handle;
        self.rows_by_id.entry(id).or_insert_with_key(|id| {
            let handle = RowHandle(*next_handle);
            *next_handle += 1;
            Row {
                handle,
                id: id.clone(),
                kind,
                cells: vec![Cell::default(); cell_count],
                payload: RowPayload::Empty,
                hung: false,
                separate_from_previous: false,
                open: false,
                cpu_bar: -0.5,
                memory_bar: 0.0,
            }
        })
    }

    /// Make the displayed order equal to the order rows were requested in
    /// since the last commit.
    ///
    /// Rows already in place are skipped, displaced ones are moved in front
    /// of the cursor and rows left behind the cursor are dropped along with
    /// their registry entries.
    pub fn commit(&mut self) -> CommitStats {
        let mut stats = CommitStats::default();
        let mut insert_point = 0;
        for id in std::mem::take(&mut self.ordered) {
            if self.live.get(insert_point) == Some(&id) {
                insert_point += 1;
                continue;
            }
            match self.live.iter().position(|live| live == &id) {
                Some(pos) => {
                    self.live.remove(pos);
                    if pos < insert_point {
                        insert_point -= 1;
                    }
                    stats.moved += 1;
                }
                None => stats.inserted += 1,
            }
            self.live.insert(insert_point, id);
            insert_point += 1;
        }
        for id in self.live.drain(insert_point..) {
            self.rows_by_id.remove(&id);
            stats.removed += 1;
        }
        log::debug!(
            "View: commit inserted={} moved={} removed={}",
            stats.inserted,
            stats.moved,
            stats.removed
        );
        stats
    }

    pub fn row(&self, id: &RowId) -> Option<&Row> {
        self.rows_by_id.get(id)
    }

    pub fn row_mut(&mut self, id: &RowId) -> Option<&mut Row> {
        self.rows_by_id.get_mut(id)
    }

    /// Displayed rows, in display order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.live.iter().filter_map(|id| self.rows_by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn registry_len(&self) -> usize {
        self.rows_by_id.len()
    }

    /// Flip the expanded state of a row. Returns the new state.
    pub fn toggle_open(&mut self, id: &RowId) -> Option<bool> {
        self.rows_by_id.get_mut(id).map(|row| {
            row.open = !row.open;
            row.open
        })
    }

    pub fn descriptors(&self) -> Vec<RowDescriptor> {
        self.rows()
            .map(|row| RowDescriptor {
                kind: row.kind,
                key: row.id.to_string(),
                pid: row.payload.pid(),
                fields: row.cells.iter().map(|c| c.text.clone()).collect(),
                titles: row.cells.iter().map(|c| c.title.clone()).collect(),
                cpu_bar: row.cpu_bar.clamp(0.0, 100.0),
                memory_bar: row.memory_bar,
                hung: row.hung,
                separate_from_previous: row.separate_from_previous,
                open: row.open,
            })
            .collect()
    }

    pub fn display_process_row(&mut self, data: &ProcessDelta, max_slope_cpu: f64, separate: bool) {
        let memory_bar = self.scale.memory_height(data.total_ram_bytes as f64);
        let row = self.get_or_create_row(RowId::Process(data.pid), RowKind::Process, 4);
        row.payload = data.clone().into();
        row.hung = data.is_hung;
        row.separate_from_previous = separate;
        row.memory_bar = memory_bar;

        row.cells[0].set(process_label(data), None);

        let total = format_memory(Some(data.total_ram_bytes as f64));
        let total_text = format!("{:.0}{}", total.amount, total.unit);
        match data.delta_ram_bytes {
            Some(delta) if delta != 0 => {
                let change = format_memory(Some(delta as f64));
                let sign = if delta > 0 { "+" } else { "-" };
                let title = format!("Evolution: {}{:.0}{}", sign, change.amount.abs(), change.unit);
                row.cells[1].set(total_text, Some(title));
            }
            _ => row.cells[1].set(total_text, None),
        }

        fill_cpu(row, 2, data, max_slope_cpu);
    }

    /// Summary of a process's threads. Returns whether the thread list is
    /// expanded.
    pub fn display_thread_summary_row(&mut self, data: &ProcessDelta) -> bool {
        let row = self.get_or_create_row(RowId::ThreadSummary(data.pid), RowKind::ThreadSummary, 2);
        row.payload = RowPayload::Process(data.clone());
        row.cells[0].set(thread_summary(&data.threads), None);
        row.open
    }

    pub fn display_window_row(&mut self, data: &WindowView) {
        let row = self.get_or_create_row(RowId::Window(data.outer_window_id), RowKind::Window, 2);
        row.payload = RowPayload::Window(data.clone());
        row.cells[0].set(window_label(data), None);
    }

    pub fn display_utility_actor_row(&mut self, actor: &UtilityActor, parent: &ProcessDelta) {
        let id = RowId::Actor(parent.pid, actor.actor_name.clone());
        let row = self.get_or_create_row(id, RowKind::Actor, 2);
        row.payload = RowPayload::Actor {
            pid: parent.pid,
            actor: actor.clone(),
        };
        row.cells[0].set(utility_actor_label(&actor.actor_name), None);
    }

    pub fn display_thread_row(&mut self, data: &ThreadDelta, max_slope_cpu: f64) {
        let row = self.get_or_create_row(RowId::Thread(data.tid), RowKind::Thread, 3);
        row.payload = data.clone().into();
        row.cells[0].set(data.name.clone(), Some(format!("Thread id: {}", data.tid)));
        fill_cpu(row, 1, data, max_slope_cpu);
    }

    /// Refresh the CPU cell and payload of an already displayed row in
    /// place. Returns false when no such row exists.
    pub fn refresh_cpu<T>(&mut self, id: &RowId, data: &T, max_slope_cpu: f64) -> bool
    where
        T: CpuUsage + Clone + Into<RowPayload>,
    {
        let Some(row) = self.rows_by_id.get_mut(id) else {
            return false;
        };
        let cell = match row.kind {
            RowKind::Process => 2,
            RowKind::Thread => 1,
            _ => return false,
        };
        fill_cpu(row, cell, data, max_slope_cpu);
        row.payload = data.clone().into();
        true
    }
}

fn fill_cpu<T: CpuUsage>(row: &mut Row, cell: usize, data: &T, max_slope_cpu: f64) {
    let mut bar_width = -0.5;
    match data.slope_cpu() {
        None => row.cells[cell].set("(measuring)", None),
        Some(slope) => {
            let total = data.total_cpu_ns();
            let duration = format_duration(total as f64);
            // Zero means below the measurement precision: show 0ms, not 0ns.
            let unit = if total == 0 { "ms" } else { duration.unit };
            let title = Some(format!("Total CPU time: {:.0}{}", duration.amount, unit));
            if slope == 0.0 {
                let text = if data.is_active() { "< 0.1%" } else { "idle" };
                row.cells[cell].set(text, title);
            } else {
                row.cells[cell].set(format_percent(slope), title);
                let mut cpu_percent = slope * 100.0;
                if max_slope_cpu > 1.0 {
                    cpu_percent /= max_slope_cpu;
                }
                bar_width = cpu_percent.max(0.5);
            }
        }
    }
    row.cpu_bar = bar_width;
}

/// Origin without its `^attributes` suffix, and whether the attributes mark
/// a private browsing context.
fn split_origin(origin: &str) -> (&str, bool) {
    match origin.split_once('^') {
        Some((base, attributes)) => {
            let private = attributes.split('&').any(|pair| {
                pair.split_once('=')
                    .is_some_and(|(key, value)| key == "privateBrowsingId" && value != "0")
            });
            (base, private)
        }
        None => (origin, false),
    }
}

pub fn process_label(data: &ProcessDelta) -> String {
    let pid = data.pid;
    let with_origin = |suffix: &str| {
        let (origin, private) = split_origin(&data.origin);
        let private = if private { " — Private" } else { "" };
        format!("{}{} ({}{})", origin, private, pid, suffix)
    };
    match &data.process_type {
        ProcessType::Browser => format!("Browser ({})", pid),
        ProcessType::Web => format!("Shared Web Process ({})", pid),
        ProcessType::WebIsolated => with_origin(""),
        ProcessType::WebServiceWorker => with_origin(", serviceworker"),
        ProcessType::WithCoopCoep => with_origin(", cross-origin isolated"),
        ProcessType::File => format!("Files ({})", pid),
        ProcessType::Extension => format!("Extensions ({})", pid),
        ProcessType::PrivilegedAbout => format!("About pages ({})", pid),
        ProcessType::PrivilegedMozilla => format!("Mozilla sites ({})", pid),
        ProcessType::Plugin => format!("Plugins ({})", pid),
        ProcessType::GmpPlugin => format!("Media plugins ({})", pid),
        ProcessType::Gpu => format!("GPU ({})", pid),
        ProcessType::Vr => format!("VR ({})", pid),
        ProcessType::Rdd => format!("Data decoder ({})", pid),
        ProcessType::Socket => format!("Network ({})", pid),
        ProcessType::RemoteSandboxBroker => format!("Remote Sandbox Broker ({})", pid),
        ProcessType::ForkServer => format!("Fork Server ({})", pid),
        ProcessType::Preallocated => format!("Preallocated ({})", pid),
        ProcessType::Utility => format!("Utility ({})", pid),
        ProcessType::Unknown(tag) => format!("Other: {} ({})", tag, pid),
    }
}

pub fn window_label(data: &WindowView) -> String {
    match &data.tab {
        Some(tab) if !tab.preloaded => format!("Tab: {}", tab.label),
        Some(_) => "Preloaded New Tab".to_string(),
        None if data.count == 1 => format!("Subframe: {}", data.document_uri),
        None => {
            let short_url = if scheme(&data.document_uri) == "about" {
                data.document_uri.clone()
            } else {
                pre_path(&data.document_uri)
            };
            format!("Subframes ({}): {}", data.count, short_url)
        }
    }
}

pub fn utility_actor_label(actor_name: &str) -> &'static str {
    match actor_name {
        "audioDecoder_Generic" => "Audio Decoder",
        "audioDecoder_AppleMedia" => "Apple Media Audio Decoder",
        "audioDecoder_WMF" => "Windows Media Framework Audio Decoder",
        "mfMediaEngineCDM" => "Windows Media Engine CDM",
        "jSOracle" => "JavaScript Oracle",
        "windowsUtils" => "Utils for Windows",
        "windowsFileDialog" => "Windows File Dialog",
        _ => "Unknown actor",
    }
}

/// Thread name without a trailing ` #123` instance number.
fn thread_family(name: &str) -> &str {
    let digits = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if digits.len() == name.len() {
        return name;
    }
    match digits.strip_suffix('#') {
        Some(base) => base.strip_suffix(' ').unwrap_or(base),
        None => name,
    }
}

pub fn thread_summary(threads: &[ThreadDelta]) -> String {
    struct Family<'a> {
        name: &'a str,
        slope_cpu: f64,
        count: usize,
    }
    let mut families: Vec<Family<'_>> = Vec::new();
    let mut active = 0;
    for thread in threads.iter().filter(|t| t.active) {
        active += 1;
        let name = thread_family(&thread.name);
        let slope = thread.slope_cpu.unwrap_or(0.0);
        match families.iter_mut().find(|f| f.name == name) {
            Some(family) => {
                family.count += 1;
                family.slope_cpu += slope;
            }
            None => families.push(Family {
                name,
                slope_cpu: slope,
                count: 1,
            }),
        }
    }

    let total = threads.len();
    if active == 0 {
        let noun = if total == 1 { "thread" } else { "threads" };
        return format!("{} inactive {}", total, noun);
    }

    families.sort_by(|a, b| {
        b.slope_cpu
            .partial_cmp(&a.slope_cpu)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let list = families
        .iter()
        .map(|family| {
            let name = if family.count > 1 {
                format!("{} × {}", family.count, family.name)
            } else {
                family.name.to_string()
            };
            let fraction = (family.slope_cpu * 1000.0).round() / 1000.0;
            if fraction != 0.0 {
                format!("{} {}", name, format_percent(fraction))
            } else {
                name
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let noun = if active == 1 { "thread" } else { "threads" };
    format!("{} active {} out of {}: {}", active, noun, total, list)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> View {
        View::new(BarScale {
            cpu_max: 100.0,
            mem_max: 1000.0,
        })
    }

    fn request(view: &mut View, pids: &[i64]) {
        for &pid in pids {
            view.get_or_create_row(RowId::Process(pid), RowKind::Process, 4);
        }
    }

    fn order(view: &View) -> Vec<String> {
        view.rows().map(|r| r.id().to_string()).collect()
    }

    fn thread(name: &str, slope: f64, active: bool) -> ThreadDelta {
        ThreadDelta {
            tid: 1,
            name: name.to_string(),
            total_cpu_ns: 0,
            slope_cpu: Some(slope),
            active,
        }
    }

    #[test]
    fn row_ids_follow_key_scheme() {
        assert_eq!(RowId::Process(5).to_string(), "p:5");
        assert_eq!(RowId::Window(77).to_string(), "w:77");
        assert_eq!(RowId::Actor(5, "jSOracle".to_string()).to_string(), "u:5jSOracle");
        assert_eq!(RowId::Thread(9).to_string(), "t:9");
        assert_eq!(RowId::ThreadSummary(5).to_string(), "ts:5");
    }

    #[test]
    fn new_rows_get_cell_placeholders() {
        let mut view = view();
        let row = view.get_or_create_row(RowId::Thread(1), RowKind::Thread, 3);
        assert_eq!(row.cells.len(), 3);
        assert!(row.cells.iter().all(|c| c.text.is_empty()));
    }

    #[test]
    fn commit_inserts_in_request_order() {
        let mut view = view();
        request(&mut view, &[1, 2, 3]);
        let stats = view.commit();
        assert_eq!(stats.inserted, 3);
        assert_eq!(order(&view), vec!["p:1", "p:2", "p:3"]);
    }

    #[test]
    fn moves_only_what_is_out_of_place() {
        let mut view = view();
        request(&mut view, &[1, 2, 3, 4]);
        view.commit();
        request(&mut view, &[1, 3, 4, 2]);
        let stats = view.commit();
        assert_eq!(order(&view), vec!["p:1", "p:3", "p:4", "p:2"]);
        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.removed, 0);
        assert!(stats.moved <= 2, "{stats:?}");
    }

    #[test]
    fn emptied_cycle_clears_everything() {
        let mut view = view();
        request(&mut view, &[1, 2]);
        view.commit();
        let stats = view.commit();
        assert_eq!(stats.removed, 2);
        assert!(view.is_empty());
        assert_eq!(view.registry_len(), 0);
    }

    #[test]
    fn open_state_survives_cycles() {
        let mut view = view();
        view.get_or_create_row(RowId::ThreadSummary(1), RowKind::ThreadSummary, 2);
        view.commit();
        assert_eq!(view.toggle_open(&RowId::ThreadSummary(1)), Some(true));
        view.get_or_create_row(RowId::ThreadSummary(1), RowKind::ThreadSummary, 2);
        view.commit();
        assert!(view.row(&RowId::ThreadSummary(1)).unwrap().open);
    }

    #[test]
    fn refresh_cpu_replaces_payload() {
        let mut view = view();
        let mut data = thread("Main", 0.1, true);
        data.tid = 4;
        view.display_thread_row(&data, 1.0);
        view.commit();

        data.slope_cpu = Some(0.25);
        assert!(view.refresh_cpu(&RowId::Thread(4), &data, 1.0));
        let row = view.row(&RowId::Thread(4)).unwrap();
        assert_eq!(row.cells[1].text, "25%");
        match &row.payload {
            RowPayload::Thread(stored) => assert_eq!(stored.slope_cpu, Some(0.25)),
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(!view.refresh_cpu(&RowId::Thread(5), &data, 1.0));
    }

    #[test]
    fn thread_family_strips_instance_number() {
        assert_eq!(thread_family("DOM Worker #12"), "DOM Worker");
        assert_eq!(thread_family("Worker#3"), "Worker");
        assert_eq!(thread_family("Renderer"), "Renderer");
        assert_eq!(thread_family("Thread42"), "Thread42");
    }

    #[test]
    fn thread_summary_groups_active_threads() {
        let threads = vec![
            thread("DOM Worker #1", 0.1, true),
            thread("DOM Worker #2", 0.2, true),
            thread("Main", 0.5, true),
            thread("Idle", 0.0, false),
        ];
        assert_eq!(
            thread_summary(&threads),
            "3 active threads out of 4: Main 50%, 2 × DOM Worker 30%"
        );
        assert_eq!(thread_summary(&threads[3..]), "1 inactive thread");
    }

    #[test]
    fn private_origins_are_labelled() {
        assert_eq!(split_origin("https://a.com^privateBrowsingId=1"), ("https://a.com", true));
        assert_eq!(split_origin("https://a.com^userContextId=2"), ("https://a.com", false));
        assert_eq!(split_origin("https://a.com"), ("https://a.com", false));
    }

    #[test]
    fn window_labels() {
        let mut win = WindowView {
            outer_window_id: 1,
            document_uri: "https://example.com/frame".to_string(),
            document_title: String::new(),
            is_process_root: false,
            is_in_process: false,
            tab: None,
            addon: None,
            count: 1,
            display_rank: 4,
        };
        assert_eq!(window_label(&win), "Subframe: https://example.com/frame");
        win.count = 3;
        assert_eq!(window_label(&win), "Subframes (3): https://example.com");
        win.document_uri = "about:blank".to_string();
        assert_eq!(window_label(&win), "Subframes (3): about:blank");
        win.document_uri = "file:///srv/www/frame.html".to_string();
        assert_eq!(window_label(&win), "Subframes (3): file://");
    }
}
