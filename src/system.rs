use crate::error::{MonitorError, Result};
use crate::model::{ProcessType, RawProcessSample, RawThreadSample};
use crate::provider::ProcessInfoProvider;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;
use sysinfo::{Pid, Process, ProcessRefreshKind, System};

/// Process-info provider reading a live browser process tree through sysinfo.
///
/// The main process is found by executable name, the children by walking
/// parent links. sysinfo only reports CPU usage per refresh, so cumulative
/// CPU time is integrated here from one refresh to the next.
pub struct SystemProvider {
    sys: System,
    browser_name: String,
    /// Integrated CPU time per pid or tid, in ns.
    accumulated: HashMap<Pid, f64>,
    last_refresh: Instant,
}

impl SystemProvider {
    /// Create a provider for the browser whose executable is named `browser_name`.
    ///
    /// # Example
    /// ```
    /// use task_monitor_lib::system::SystemProvider;
    /// let provider = SystemProvider::new("firefox");
    /// assert_eq!(provider.browser_name(), "firefox");
    /// ```
    pub fn new(browser_name: &str) -> Self {
        log::debug!("SystemProvider::new() -> watching {:?}", browser_name);
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        Self {
            sys,
            browser_name: browser_name.to_lowercase(),
            accumulated: HashMap::new(),
            last_refresh: Instant::now(),
        }
    }

    pub fn browser_name(&self) -> &str {
        &self.browser_name
    }

    fn matches_browser(&self, process: &Process) -> bool {
        let name = process.name().to_string_lossy().to_lowercase();
        let name = name.strip_suffix(".exe").unwrap_or(&name);
        name == self.browser_name || name.starts_with(&format!("{}-", self.browser_name))
    }

    /// Main browser process: a matching process whose parent is not one.
    fn find_root(&self) -> Option<Pid> {
        let processes = self.sys.processes();
        processes
            .values()
            .filter(|p| p.thread_kind().is_none() && self.matches_browser(p))
            .filter(|p| {
                !p.parent()
                    .and_then(|parent| processes.get(&parent))
                    .is_some_and(|parent| self.matches_browser(parent))
            })
            .map(|p| p.pid())
            .min()
    }

    /// The root followed by its descendants, breadth first.
    fn process_tree(&self, root: Pid) -> Vec<Pid> {
        let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for p in self.sys.processes().values() {
            if p.thread_kind().is_some() {
                continue;
            }
            if let Some(parent) = p.parent() {
                children.entry(parent).or_default().push(p.pid());
            }
        }

        let mut tree = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(pid) = queue.pop_front() {
            if !seen.insert(pid) {
                continue;
            }
            tree.push(pid);
            if let Some(kids) = children.get_mut(&pid) {
                kids.sort();
                queue.extend(kids.iter().copied());
            }
        }
        tree
    }

    fn integrate_cpu(&mut self, tracked: &[Pid]) {
        let elapsed_ns = self.last_refresh.elapsed().as_nanos() as f64;
        self.last_refresh = Instant::now();
        let processes = self.sys.processes();
        let mut accumulated = HashMap::with_capacity(tracked.len());
        for pid in tracked {
            let usage = processes
                .get(pid)
                .map(|p| p.cpu_usage() as f64 / 100.0)
                .unwrap_or(0.0);
            let previous = self.accumulated.get(pid).copied().unwrap_or(0.0);
            accumulated.insert(*pid, previous + usage * elapsed_ns);
        }
        self.accumulated = accumulated;
    }

    fn threads_of(&self, process: &Process) -> Vec<RawThreadSample> {
        let Some(tasks) = process.tasks() else {
            return Vec::new();
        };
        let mut threads: Vec<RawThreadSample> = tasks
            .iter()
            .map(|tid| {
                let name = self
                    .sys
                    .process(*tid)
                    .map(|t| t.name().to_string_lossy().into_owned())
                    .unwrap_or_default();
                RawThreadSample {
                    tid: tid.as_u32() as i64,
                    name,
                    cpu_time_ns: self.accumulated_ns(*tid),
                    cpu_cycle_count: 0,
                }
            })
            .collect();
        threads.sort_by_key(|t| t.tid);
        threads
    }

    fn accumulated_ns(&self, pid: Pid) -> u64 {
        self.accumulated.get(&pid).copied().unwrap_or(0.0) as u64
    }
}

impl ProcessInfoProvider for SystemProvider {
    fn request_snapshot(&mut self) -> Result<Vec<RawProcessSample>> {
        log::debug!("SystemProvider: refresh start");
        self.sys.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );

        let root = self.find_root().ok_or_else(|| {
            MonitorError::ProviderFailed(format!("no {} process is running", self.browser_name))
        })?;
        let tree = self.process_tree(root);

        let mut tracked = tree.clone();
        for pid in &tree {
            if let Some(tasks) = self.sys.process(*pid).and_then(Process::tasks) {
                tracked.extend(tasks.iter().copied());
            }
        }
        self.integrate_cpu(&tracked);

        let mut samples = Vec::with_capacity(tree.len());
        for pid in tree {
            // Exited between the refresh and now.
            let Some(process) = self.sys.process(pid) else {
                continue;
            };
            let args: Vec<String> = process
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy().into_owned())
                .collect();
            let (process_type, child_id) = if pid == root {
                (ProcessType::Browser, None)
            } else {
                classify_command(&args)
            };

            let mut sample = RawProcessSample::new(pid.as_u32() as i64, process_type);
            sample.child_id = child_id;
            sample.memory_bytes = process.memory();
            sample.cpu_time_ns = self.accumulated_ns(pid);
            sample.threads = self.threads_of(process);
            samples.push(sample);
        }
        log::debug!("SystemProvider: {} browser processes", samples.len());
        Ok(samples)
    }
}

/// Type and child id of a browser child process, read from its command line.
///
/// Content processes end their arguments with the process type (`tab`,
/// `gpu`, `rdd`, ...) and carry `-childID <n>`.
pub fn classify_command(args: &[String]) -> (ProcessType, Option<u64>) {
    let child_id = args
        .iter()
        .position(|arg| arg == "-childID")
        .and_then(|i| args.get(i + 1))
        .and_then(|id| id.parse().ok());

    if !args.iter().any(|arg| arg == "-contentproc") {
        return (ProcessType::Unknown(String::new()), child_id);
    }
    let process_type = match args.last().map(String::as_str) {
        Some("tab") => ProcessType::Web,
        Some("gmplugin") => ProcessType::GmpPlugin,
        Some("forkserver") => ProcessType::ForkServer,
        Some(tag) => tag.parse().unwrap_or(ProcessType::Unknown(tag.to_string())),
        None => ProcessType::Unknown(String::new()),
    };
    (process_type, child_id)
}
