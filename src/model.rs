//! Raw samples reported by the process-info provider and the per-cycle
//! records derived from them.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Kind of browser process, as tagged by the process-info provider.
///
/// Unrecognised tags are kept verbatim in [`ProcessType::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessType {
    Browser,
    Web,
    WebIsolated,
    WebServiceWorker,
    WithCoopCoep,
    File,
    Extension,
    PrivilegedAbout,
    PrivilegedMozilla,
    Plugin,
    GmpPlugin,
    Gpu,
    Vr,
    Rdd,
    Socket,
    RemoteSandboxBroker,
    ForkServer,
    Preallocated,
    Utility,
    Unknown(String),
}

impl ProcessType {
    /// The provider's tag for this type.
    pub fn as_str(&self) -> &str {
        match self {
            ProcessType::Browser => "browser",
            ProcessType::Web => "web",
            ProcessType::WebIsolated => "webIsolated",
            ProcessType::WebServiceWorker => "webServiceWorker",
            ProcessType::WithCoopCoep => "withCoopCoep",
            ProcessType::File => "file",
            ProcessType::Extension => "extension",
            ProcessType::PrivilegedAbout => "privilegedabout",
            ProcessType::PrivilegedMozilla => "privilegedmozilla",
            ProcessType::Plugin => "plugin",
            ProcessType::GmpPlugin => "gmpPlugin",
            ProcessType::Gpu => "gpu",
            ProcessType::Vr => "vr",
            ProcessType::Rdd => "rdd",
            ProcessType::Socket => "socket",
            ProcessType::RemoteSandboxBroker => "remoteSandboxBroker",
            ProcessType::ForkServer => "forkServer",
            ProcessType::Preallocated => "preallocated",
            ProcessType::Utility => "utility",
            ProcessType::Unknown(tag) => tag,
        }
    }

    /// Abbreviated type used in tooltip lines.
    pub fn short_name(&self) -> &str {
        match self {
            ProcessType::WebIsolated => "webIs",
            ProcessType::PrivilegedAbout => "about",
            ProcessType::PrivilegedMozilla => "mozilla",
            ProcessType::Preallocated => "pre",
            ProcessType::Unknown(_) => "unknown",
            other => other.as_str(),
        }
    }

    /// Whether tooltips identify this process by origin rather than by type.
    pub fn titled_by_origin(&self) -> bool {
        matches!(self, ProcessType::Web | ProcessType::WebIsolated)
    }
}

impl FromStr for ProcessType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "browser" => ProcessType::Browser,
            "web" => ProcessType::Web,
            "webIsolated" => ProcessType::WebIsolated,
            "webServiceWorker" => ProcessType::WebServiceWorker,
            "withCoopCoep" => ProcessType::WithCoopCoep,
            "file" => ProcessType::File,
            "extension" => ProcessType::Extension,
            "privilegedabout" => ProcessType::PrivilegedAbout,
            "privilegedmozilla" => ProcessType::PrivilegedMozilla,
            "plugin" => ProcessType::Plugin,
            "gmpPlugin" => ProcessType::GmpPlugin,
            "gpu" => ProcessType::Gpu,
            "vr" => ProcessType::Vr,
            "rdd" => ProcessType::Rdd,
            "socket" => ProcessType::Socket,
            "remoteSandboxBroker" => ProcessType::RemoteSandboxBroker,
            "forkServer" => ProcessType::ForkServer,
            "preallocated" => ProcessType::Preallocated,
            "utility" => ProcessType::Utility,
            other => ProcessType::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawThreadSample {
    pub tid: i64,
    /// May be empty; displayed as `(tid)` then.
    pub name: String,
    pub cpu_time_ns: u64,
    pub cpu_cycle_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawWindowSample {
    pub outer_window_id: u64,
    pub document_uri: String,
    pub document_title: String,
    pub is_process_root: bool,
    pub is_in_process: bool,
}

/// An actor hosted by a utility process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilityActor {
    pub actor_name: String,
}

/// One process at one sampling instant.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProcessSample {
    pub pid: i64,
    /// Handle of the owning child process; `None` for the main process.
    pub child_id: Option<u64>,
    pub process_type: ProcessType,
    pub origin: String,
    pub memory_bytes: u64,
    /// Cumulative CPU time since process start, never decreasing.
    pub cpu_time_ns: u64,
    pub cpu_cycle_count: u64,
    pub threads: Vec<RawThreadSample>,
    pub windows: Vec<RawWindowSample>,
    pub utility_actors: Vec<UtilityActor>,
    /// Stamped by the snapshot source, in milliseconds.
    pub sampled_at_ms: f64,
}

impl RawProcessSample {
    /// A sample with no threads, windows or actors.
    pub fn new(pid: i64, process_type: ProcessType) -> Self {
        Self {
            pid,
            child_id: None,
            process_type,
            origin: String::new(),
            memory_bytes: 0,
            cpu_time_ns: 0,
            cpu_cycle_count: 0,
            threads: Vec::new(),
            windows: Vec::new(),
            utility_actors: Vec::new(),
            sampled_at_ms: 0.0,
        }
    }
}

/// A timestamped capture of every process known to the browser.
///
/// Processes keep the order in which the provider reported them.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    processes: Vec<RawProcessSample>,
    index: HashMap<i64, usize>,
    pub taken_at_ms: f64,
}

impl Snapshot {
    /// Build a snapshot from one provider response, stamping every sample
    /// with the same instant.
    pub fn from_samples(samples: Vec<RawProcessSample>, taken_at_ms: f64) -> Self {
        let mut processes = Vec::with_capacity(samples.len());
        let mut index = HashMap::with_capacity(samples.len());
        for mut sample in samples {
            sample.sampled_at_ms = taken_at_ms;
            match index.get(&sample.pid) {
                Some(&slot) => processes[slot] = sample,
                None => {
                    index.insert(sample.pid, processes.len());
                    processes.push(sample);
                }
            }
        }
        Self {
            processes,
            index,
            taken_at_ms,
        }
    }

    pub fn get(&self, pid: i64) -> Option<&RawProcessSample> {
        self.index.get(&pid).map(|&slot| &self.processes[slot])
    }

    pub fn processes(&self) -> impl Iterator<Item = &RawProcessSample> {
        self.processes.iter()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// The UI tab owning a window, as reported by the window registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub label: String,
    pub image: Option<String>,
    /// A preloaded browser not yet attached to a tab strip.
    pub preloaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonInfo {
    pub id: String,
    pub name: String,
}

/// A window of a process after tab resolution and subframe collapsing.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowView {
    pub outer_window_id: u64,
    pub document_uri: String,
    pub document_title: String,
    pub is_process_root: bool,
    pub is_in_process: bool,
    pub tab: Option<TabInfo>,
    pub addon: Option<AddonInfo>,
    /// Number of same-origin subframes folded into this one.
    pub count: usize,
    pub display_rank: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadDelta {
    pub tid: i64,
    pub name: String,
    pub total_cpu_ns: u64,
    pub slope_cpu: Option<f64>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessDelta {
    pub pid: i64,
    pub child_id: Option<u64>,
    pub total_ram_bytes: u64,
    pub delta_ram_bytes: Option<i64>,
    pub total_cpu_ns: u64,
    /// Fraction of one core used since the previous sample.
    pub slope_cpu: Option<f64>,
    pub active: bool,
    pub process_type: ProcessType,
    pub origin: String,
    pub display_rank: u8,
    pub windows: Vec<WindowView>,
    pub utility_actors: Vec<UtilityActor>,
    pub threads: Vec<ThreadDelta>,
    /// Set when every titled window of the process shares one title.
    pub title: Option<String>,
    pub is_hung: bool,
}

/// CPU figures shared by process and thread records.
pub trait CpuUsage {
    fn slope_cpu(&self) -> Option<f64>;
    fn is_active(&self) -> bool;
    fn total_cpu_ns(&self) -> u64;
}

impl CpuUsage for ProcessDelta {
    fn slope_cpu(&self) -> Option<f64> {
        self.slope_cpu
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn total_cpu_ns(&self) -> u64 {
        self.total_cpu_ns
    }
}

impl CpuUsage for ThreadDelta {
    fn slope_cpu(&self) -> Option<f64> {
        self.slope_cpu
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn total_cpu_ns(&self) -> u64 {
        self.total_cpu_ns
    }
}
