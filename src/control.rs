use crate::aggregate::{summarize, Summary};
use crate::config::AppConfig;
use crate::delta::compute_counters;
use crate::error::Result;
use crate::model::{ProcessDelta, ProcessType};
use crate::provider::{ProcessInfoProvider, WindowRegistry};
use crate::snapshot::SnapshotSource;
use crate::sort::{sort_processes, sort_threads, sort_windows, SortColumn, SortOrder};
use crate::view::{CommitStats, RowId, View};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Outcome of one display cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub stats: CommitStats,
    /// False when rows were refreshed in place because the user interacted
    /// recently.
    pub reordered: bool,
    pub processes: usize,
}

/// One monitored browser session: samples processes, derives their
/// figures and keeps the displayed rows in sync.
pub struct TaskMonitor<P, R> {
    source: SnapshotSource<P>,
    registry: R,
    view: View,
    config: AppConfig,
    sort: SortOrder,
    /// Child ids reported hung since the last display cycle.
    hung_items: HashSet<u64>,
    last_interaction: Option<Instant>,
    max_slope_cpu: f64,
    counters: Vec<ProcessDelta>,
}

impl<P: ProcessInfoProvider, R: WindowRegistry> TaskMonitor<P, R> {
    pub fn new(provider: P, registry: R, config: AppConfig) -> Self {
        log::debug!("TaskMonitor::new() -> min sampling interval {:?}", config.minimum_interval());
        Self {
            source: SnapshotSource::new(provider, config.minimum_interval()),
            registry,
            view: View::new(config.bar_scale()),
            config,
            sort: SortOrder::default(),
            hung_items: HashSet::new(),
            last_interaction: None,
            max_slope_cpu: 0.0,
            counters: Vec::new(),
        }
    }

    /// Sample (when due or forced) and redisplay.
    ///
    /// Provider failures propagate; the previous display is left as it was.
    pub fn update(&mut self, force: bool) -> Result<CycleReport> {
        self.source.update(force)?;
        self.update_display(force)
    }

    /// [`update`](Self::update) with an explicit sampling timestamp in ms.
    pub fn update_at(&mut self, force: bool, now_ms: f64) -> Result<CycleReport> {
        self.source.update_at(force, now_ms)?;
        self.update_display(force)
    }

    /// Recompute deltas from the stored snapshots and reconcile the rows.
    ///
    /// Unless `force` is set, a recent user interaction limits the cycle to
    /// refreshing CPU cells of rows already displayed.
    pub fn update_display(&mut self, force: bool) -> Result<CycleReport> {
        let Some(pair) = self.source.pair() else {
            return Ok(CycleReport::default());
        };
        let mut counters = compute_counters(pair, &mut self.registry)?;

        // The hang monitor reports again before the next cycle.
        let hung_items = std::mem::take(&mut self.hung_items);

        sort_processes(&mut counters, self.sort);
        self.max_slope_cpu = counters
            .iter()
            .map(|p| p.slope_cpu.unwrap_or(0.0))
            .fold(0.0, f64::max);
        for process in &mut counters {
            sort_windows(&mut process.windows, self.sort);
            sort_threads(&mut process.threads, self.sort);
            process.is_hung = process.child_id.is_some_and(|id| hung_items.contains(&id));
        }

        let report = if !force && self.recently_interacted() {
            log::debug!("TaskMonitor: pointer moved recently, keeping row order");
            for process in &counters {
                self.view
                    .refresh_cpu(&RowId::Process(process.pid), process, self.max_slope_cpu);
                for thread in &process.threads {
                    self.view
                        .refresh_cpu(&RowId::Thread(thread.tid), thread, self.max_slope_cpu);
                }
            }
            CycleReport {
                stats: CommitStats::default(),
                reordered: false,
                processes: counters.len(),
            }
        } else {
            self.display(&counters);
            CycleReport {
                stats: self.view.commit(),
                reordered: true,
                processes: counters.len(),
            }
        };
        self.counters = counters;
        Ok(report)
    }

    fn display(&mut self, counters: &[ProcessDelta]) {
        let grouped = self.sort.is_grouped();
        let mut previous_rank = None;
        for process in counters {
            let separate = grouped && previous_rank.is_some_and(|rank| rank != process.display_rank);
            self.view
                .display_process_row(process, self.max_slope_cpu, separate);

            if process.process_type != ProcessType::Extension {
                for win in process.windows.iter().filter(|w| w.tab.is_some() || w.is_process_root) {
                    self.view.display_window_row(win);
                }
            }
            if process.process_type == ProcessType::Utility {
                for actor in &process.utility_actors {
                    self.view.display_utility_actor_row(actor, process);
                }
            }
            if !process.threads.is_empty() && self.view.display_thread_summary_row(process) {
                for thread in &process.threads {
                    self.view.display_thread_row(thread, self.max_slope_cpu);
                }
            }
            previous_rank = Some(process.display_rank);
        }
    }

    fn recently_interacted(&self) -> bool {
        self.last_interaction
            .is_some_and(|at| at.elapsed() < self.config.quiet_window())
    }

    /// Record a pointer event over the process list.
    pub fn note_user_interaction(&mut self) {
        self.note_user_interaction_at(Instant::now());
    }

    pub fn note_user_interaction_at(&mut self, at: Instant) {
        self.last_interaction = Some(at);
    }

    /// Time left before rows may move again.
    pub fn quiet_remaining(&self) -> Duration {
        self.last_interaction
            .map(|at| self.config.quiet_window().saturating_sub(at.elapsed()))
            .unwrap_or_default()
    }

    /// Mark a child process as hung for the next display cycle.
    pub fn report_hang(&mut self, child_id: u64) {
        self.hung_items.insert(child_id);
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort = order;
    }

    /// Select a column by key (`None` for the grouped default order).
    pub fn set_sort_key(&mut self, column: Option<&str>, ascending: bool) -> Result<()> {
        self.sort = SortOrder::parse(column, ascending)?;
        Ok(())
    }

    /// Header click, followed by a forced redisplay.
    pub fn toggle_sort(&mut self, column: SortColumn) -> Result<CycleReport> {
        self.sort.toggle(column);
        self.update_display(true)
    }

    /// Expand or collapse the thread list of a process and redisplay.
    /// Returns the new state, or `None` if the process shows no thread summary.
    pub fn toggle_threads(&mut self, pid: i64) -> Result<Option<bool>> {
        let state = self.view.toggle_open(&RowId::ThreadSummary(pid));
        if state.is_some() {
            self.update_display(true)?;
        }
        Ok(state)
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Process records of the last cycle, in display order.
    pub fn counters(&self) -> &[ProcessDelta] {
        &self.counters
    }

    pub fn max_slope_cpu(&self) -> f64 {
        self.max_slope_cpu
    }

    pub fn summary(&self) -> Summary {
        summarize(&self.counters, &self.config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn source(&self) -> &SnapshotSource<P> {
        &self.source
    }

    pub fn provider_mut(&mut self) -> &mut P {
        self.source.provider_mut()
    }

    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }
}
