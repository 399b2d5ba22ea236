//! Whole-browser totals, tooltip text and the per-tab bar figures.

use crate::config::{AppConfig, BarScale};
use crate::format::{memory_with_unit, parse_memory_string};
use crate::model::{ProcessDelta, ProcessType};
use serde::Serialize;

const IDEOGRAPHIC_SPACE: char = '\u{3000}';

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    /// Sum of per-process CPU, in percent of one core.
    pub total_cpu: f64,
    pub total_memory: f64,
}

/// Sum CPU and memory over all processes. Processes without a CPU rate yet
/// count as zero.
pub fn aggregate(processes: &[ProcessDelta]) -> Totals {
    processes.iter().fold(Totals::default(), |acc, p| Totals {
        total_cpu: acc.total_cpu + p.slope_cpu.unwrap_or(0.0) * 100.0,
        total_memory: acc.total_memory + p.total_ram_bytes as f64,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabLine {
    pub outer_window_id: u64,
    pub title: String,
}

/// One process as listed in the tooltip and on its tabs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub pid: i64,
    /// Percent of one core, `None` until a rate is known.
    pub cpu: Option<f64>,
    pub memory: u64,
    pub mem_united: String,
    pub title: String,
    pub tabs: Vec<TabLine>,
}

impl TaskInfo {
    pub fn from_delta(process: &ProcessDelta) -> Self {
        let title = if process.process_type.titled_by_origin() {
            process.origin.clone()
        } else {
            process.process_type.short_name().to_string()
        };
        let tabs = if process.process_type == ProcessType::Extension {
            Vec::new()
        } else {
            process
                .windows
                .iter()
                .filter_map(|win| match &win.tab {
                    Some(tab) if !tab.preloaded => Some(TabLine {
                        outer_window_id: win.outer_window_id,
                        title: tab.label.clone(),
                    }),
                    _ => None,
                })
                .collect()
        };
        Self {
            pid: process.pid,
            cpu: process.slope_cpu.map(|slope| slope * 100.0),
            memory: process.total_ram_bytes,
            mem_united: memory_with_unit(process.total_ram_bytes as f64),
            title,
            tabs,
        }
    }

    /// `cpu\tmemory\ttitle\tpid`, then one indented line per tab.
    pub fn tooltip_text(&self) -> String {
        let cpu = match self.cpu {
            Some(cpu) if cpu.is_finite() => format!("{}", cpu.round()),
            _ => "?".to_string(),
        };
        let mut text = format!("{}\t{}\t{}\t{}", cpu, self.mem_united, self.title, self.pid);
        for tab in &self.tabs {
            text.push('\n');
            text.push(IDEOGRAPHIC_SPACE);
            text.push_str("└ ");
            text.push_str(&tab.title);
        }
        text
    }
}

pub fn tooltip_lines(tasks: &[TaskInfo]) -> Vec<String> {
    tasks
        .iter()
        .flat_map(|task| {
            task.tooltip_text()
                .lines()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Memory shown across tooltip lines, read back from their memory column.
/// Tab lines are skipped and unreadable amounts count as zero.
pub fn tooltip_memory(lines: &[String]) -> f64 {
    lines
        .iter()
        .filter(|line| !line.starts_with(IDEOGRAPHIC_SPACE))
        .filter_map(|line| line.split('\t').nth(1))
        .map(|memory| parse_memory_string(memory).unwrap_or(0.0))
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuItem {
    pub label: String,
    pub tooltip: String,
    pub hidden: bool,
}

/// Fill `count` menu slots with the first tooltip lines; slots without a
/// line are hidden.
pub fn menu_items(lines: &[String], count: usize) -> Vec<MenuItem> {
    (0..count)
        .map(|i| match lines.get(i) {
            Some(line) => MenuItem {
                label: line.replace('\t', &IDEOGRAPHIC_SPACE.to_string()),
                tooltip: line.clone(),
                hidden: false,
            },
            None => MenuItem {
                label: String::new(),
                tooltip: String::new(),
                hidden: true,
            },
        })
        .collect()
}

/// Bars painted on one tab button.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabBars {
    pub outer_window_id: u64,
    pub pid: i64,
    pub cpu_height: f64,
    pub memory_height: f64,
    pub tooltip: String,
}

pub fn tab_bars(tasks: &[TaskInfo], scale: BarScale) -> Vec<TabBars> {
    tasks
        .iter()
        .flat_map(|task| {
            let tooltip = task.tooltip_text();
            let cpu_height = scale.cpu_height(task.cpu.unwrap_or(0.0));
            let memory_height = scale.memory_height(task.memory as f64);
            task.tabs.iter().map(move |tab| TabBars {
                outer_window_id: tab.outer_window_id,
                pid: task.pid,
                cpu_height,
                memory_height,
                tooltip: tooltip.clone(),
            })
        })
        .collect()
}

/// Everything the summary widget and the tab buttons display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub totals: Totals,
    pub cpu_height: f64,
    pub memory_height: f64,
    pub tooltip: String,
    pub menu: Vec<MenuItem>,
    /// Tooltip lines that did not fit in the menu.
    pub hidden_lines: usize,
    /// Memory shown on those lines.
    pub hidden_memory: f64,
    pub tasks: Vec<TaskInfo>,
    pub tabs: Vec<TabBars>,
}

/// Summarise processes already in display order.
pub fn summarize(processes: &[ProcessDelta], config: &AppConfig) -> Summary {
    let tasks: Vec<TaskInfo> = processes.iter().map(TaskInfo::from_delta).collect();
    let totals = aggregate(processes);
    let lines = tooltip_lines(&tasks);
    let scale = config.summary_scale();
    Summary {
        totals,
        cpu_height: scale.cpu_height(totals.total_cpu),
        memory_height: scale.memory_height(totals.total_memory),
        tooltip: lines.join("\n"),
        menu: menu_items(&lines, config.menu_task_count),
        hidden_lines: lines.len().saturating_sub(config.menu_task_count),
        hidden_memory: tooltip_memory(lines.get(config.menu_task_count..).unwrap_or_default()),
        tabs: tab_bars(&tasks, config.bar_scale()),
        tasks,
    }
}
