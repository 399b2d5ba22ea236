use crate::error::{MonitorError, Result};
use crate::model::{CpuUsage, ProcessDelta, ThreadDelta, WindowView};
use std::cmp::Ordering;
use std::str::FromStr;

/// Columns the process table can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    CpuTotal,
    MemoryResident,
}

impl SortColumn {
    pub fn key(&self) -> &'static str {
        match self {
            SortColumn::Name => "name",
            SortColumn::CpuTotal => "cpu-total",
            SortColumn::MemoryResident => "memory-resident",
        }
    }
}

impl FromStr for SortColumn {
    type Err = MonitorError;

    /// Accepts both `cpu-total` and the header id form `column-cpu-total`.
    fn from_str(s: &str) -> Result<Self> {
        match s.strip_prefix("column-").unwrap_or(s) {
            "name" => Ok(SortColumn::Name),
            "cpu-total" => Ok(SortColumn::CpuTotal),
            "memory-resident" => Ok(SortColumn::MemoryResident),
            _ => Err(MonitorError::UnsupportedSortColumn(s.to_string())),
        }
    }
}

/// Selected column (`None` = grouped default order) and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub column: Option<SortColumn>,
    pub ascending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            column: None,
            ascending: true,
        }
    }
}

impl SortOrder {
    /// Parse an optional column key. Unknown keys are an error.
    pub fn parse(column: Option<&str>, ascending: bool) -> Result<Self> {
        let column = column.map(SortColumn::from_str).transpose()?;
        Ok(Self { column, ascending })
    }

    /// Header click: the same column flips direction, another one starts ascending.
    pub fn toggle(&mut self, column: SortColumn) {
        if self.column == Some(column) {
            self.ascending = !self.ascending;
        } else {
            self.column = Some(column);
            self.ascending = true;
        }
    }

    /// Whether rank changes between consecutive processes get a separator.
    pub fn is_grouped(&self) -> bool {
        self.column.is_none()
    }

    fn apply(&self, order: Ordering) -> Ordering {
        if self.ascending {
            order
        } else {
            order.reverse()
        }
    }
}

/// Case-insensitive comparison, falling back to a byte comparison so that
/// distinct strings never compare equal.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Busiest first: current rate, then activity, then historical total.
pub fn compare_cpu<T: CpuUsage>(a: &T, b: &T) -> Ordering {
    cmp_f64(b.slope_cpu().unwrap_or(0.0), a.slope_cpu().unwrap_or(0.0))
        .then_with(|| b.is_active().cmp(&a.is_active()))
        .then_with(|| b.total_cpu_ns().cmp(&a.total_cpu_ns()))
}

pub fn compare_processes(a: &ProcessDelta, b: &ProcessDelta, column: Option<SortColumn>) -> Ordering {
    match column {
        Some(SortColumn::Name) => locale_compare(&a.origin, &b.origin)
            .then_with(|| locale_compare(a.process_type.as_str(), b.process_type.as_str()))
            .then_with(|| a.pid.cmp(&b.pid)),
        Some(SortColumn::CpuTotal) => compare_cpu(a, b).then_with(|| a.pid.cmp(&b.pid)),
        Some(SortColumn::MemoryResident) => b
            .total_ram_bytes
            .cmp(&a.total_ram_bytes)
            .then_with(|| a.pid.cmp(&b.pid)),
        None => a
            .display_rank
            .cmp(&b.display_rank)
            .then_with(|| locale_compare(&a.origin, &b.origin))
            .then_with(|| a.pid.cmp(&b.pid)),
    }
}

pub fn sort_processes(counters: &mut [ProcessDelta], order: SortOrder) {
    counters.sort_by(|a, b| order.apply(compare_processes(a, b, order.column)));
}

pub fn compare_threads(a: &ThreadDelta, b: &ThreadDelta, column: Option<SortColumn>) -> Ordering {
    match column {
        Some(SortColumn::Name) => locale_compare(&a.name, &b.name).then_with(|| a.tid.cmp(&b.tid)),
        Some(SortColumn::CpuTotal) => compare_cpu(a, b).then_with(|| a.tid.cmp(&b.tid)),
        Some(SortColumn::MemoryResident) | None => a.tid.cmp(&b.tid),
    }
}

pub fn sort_threads(threads: &mut [ThreadDelta], order: SortOrder) {
    threads.sort_by(|a, b| order.apply(compare_threads(a, b, order.column)));
}

/// Windows of one process: rank, then title, then URI. The column does
/// not matter here, only the direction.
pub fn sort_windows(windows: &mut [WindowView], order: SortOrder) {
    windows.sort_by(|a, b| {
        order.apply(
            a.display_rank
                .cmp(&b.display_rank)
                .then_with(|| locale_compare(&a.document_title, &b.document_title))
                .then_with(|| locale_compare(&a.document_uri, &b.document_uri)),
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessType;

    fn process(
        pid: i64,
        process_type: ProcessType,
        origin: &str,
        display_rank: u8,
        slope: Option<f64>,
        memory: u64,
    ) -> ProcessDelta {
        ProcessDelta {
            pid,
            child_id: None,
            total_ram_bytes: memory,
            delta_ram_bytes: None,
            total_cpu_ns: 0,
            slope_cpu: slope,
            active: slope.is_some(),
            process_type,
            origin: origin.to_string(),
            display_rank,
            windows: Vec::new(),
            utility_actors: Vec::new(),
            threads: Vec::new(),
            title: None,
            is_hung: false,
        }
    }

    fn processes() -> Vec<ProcessDelta> {
        vec![
            process(50, ProcessType::WebIsolated, "https://a.org", 1, None, 200),
            process(10, ProcessType::Gpu, "", 2, Some(0.2), 100),
            process(40, ProcessType::WebIsolated, "https://B.org", 1, Some(0.5), 300),
            process(60, ProcessType::WebIsolated, "https://a.org", 1, Some(0.0), 200),
            process(20, ProcessType::Browser, "", 0, Some(0.1), 500),
            process(30, ProcessType::WebIsolated, "https://b.org", 1, Some(0.5), 300),
        ]
    }

    fn pids_in(column: Option<SortColumn>, ascending: bool) -> Vec<i64> {
        let mut counters = processes();
        sort_processes(&mut counters, SortOrder { column, ascending });
        counters.iter().map(|p| p.pid).collect()
    }

    fn window(display_rank: u8, title: &str, uri: &str) -> WindowView {
        WindowView {
            outer_window_id: 0,
            document_uri: uri.to_string(),
            document_title: title.to_string(),
            is_process_root: false,
            is_in_process: true,
            tab: None,
            addon: None,
            count: 1,
            display_rank,
        }
    }

    fn thread(tid: i64, name: &str, slope: Option<f64>, active: bool, total: u64) -> ThreadDelta {
        ThreadDelta {
            tid,
            name: name.to_string(),
            total_cpu_ns: total,
            slope_cpu: slope,
            active,
        }
    }

    #[test]
    fn column_keys_parse() {
        assert_eq!("cpu-total".parse::<SortColumn>().unwrap(), SortColumn::CpuTotal);
        assert_eq!("column-name".parse::<SortColumn>().unwrap(), SortColumn::Name);
        assert!(matches!(
            "column-pids".parse::<SortColumn>(),
            Err(MonitorError::UnsupportedSortColumn(_))
        ));
        assert!(SortOrder::parse(Some("bogus"), true).is_err());
        assert_eq!(SortOrder::parse(None, false).unwrap().column, None);
    }

    #[test]
    fn toggle_flips_direction_on_same_column() {
        let mut order = SortOrder::default();
        order.toggle(SortColumn::Name);
        assert_eq!(order.column, Some(SortColumn::Name));
        assert!(order.ascending);
        order.toggle(SortColumn::Name);
        assert!(!order.ascending);
        order.toggle(SortColumn::CpuTotal);
        assert!(order.ascending);
    }

    #[test]
    fn locale_compare_ignores_case_first() {
        assert_eq!(locale_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_compare("Apple", "apple"), Ordering::Less);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn cpu_ties_fall_back_to_activity_then_total() {
        let mut threads = vec![
            thread(1, "a", Some(0.0), false, 900),
            thread(2, "b", Some(0.0), true, 10),
            thread(3, "c", Some(0.5), false, 1),
            thread(4, "d", Some(0.0), false, 1000),
        ];
        let order = SortOrder {
            column: Some(SortColumn::CpuTotal),
            ascending: true,
        };
        sort_threads(&mut threads, order);
        let tids: Vec<i64> = threads.iter().map(|t| t.tid).collect();
        assert_eq!(tids, vec![3, 2, 4, 1]);
    }

    #[test]
    fn threads_by_name_then_tid() {
        let mut threads = vec![
            thread(9, "Worker", None, false, 0),
            thread(2, "worker", None, false, 0),
            thread(5, "Main", None, false, 0),
        ];
        sort_threads(
            &mut threads,
            SortOrder {
                column: Some(SortColumn::Name),
                ascending: true,
            },
        );
        let tids: Vec<i64> = threads.iter().map(|t| t.tid).collect();
        assert_eq!(tids, vec![5, 9, 2]);

        sort_threads(&mut threads, SortOrder::default());
        let tids: Vec<i64> = threads.iter().map(|t| t.tid).collect();
        assert_eq!(tids, vec![2, 5, 9]);
    }

    #[test]
    fn processes_sort_in_both_directions() {
        let expected = [
            (Some(SortColumn::Name), vec![20, 10, 50, 60, 40, 30]),
            (Some(SortColumn::CpuTotal), vec![30, 40, 10, 20, 60, 50]),
            (Some(SortColumn::MemoryResident), vec![20, 30, 40, 50, 60, 10]),
            (None, vec![20, 50, 60, 40, 30, 10]),
        ];
        for (column, ascending) in expected {
            assert_eq!(pids_in(column, true), ascending, "{column:?}");
            let mut descending = ascending;
            descending.reverse();
            assert_eq!(pids_in(column, false), descending, "{column:?}");
        }
    }

    #[test]
    fn windows_sort_by_rank_title_then_uri() {
        let mut windows = vec![
            window(3, "b", "z"),
            window(3, "a", "y"),
            window(1, "z", "a"),
            window(3, "a", "x"),
        ];
        let key = |w: &WindowView| (w.display_rank, w.document_title.clone(), w.document_uri.clone());
        let expected = vec![
            (1, "z".to_string(), "a".to_string()),
            (3, "a".to_string(), "x".to_string()),
            (3, "a".to_string(), "y".to_string()),
            (3, "b".to_string(), "z".to_string()),
        ];

        sort_windows(&mut windows, SortOrder::default());
        assert_eq!(windows.iter().map(key).collect::<Vec<_>>(), expected);

        let descending = SortOrder {
            column: Some(SortColumn::Name),
            ascending: false,
        };
        sort_windows(&mut windows, descending);
        let mut reversed = expected.clone();
        reversed.reverse();
        assert_eq!(windows.iter().map(key).collect::<Vec<_>>(), reversed);
    }
}
