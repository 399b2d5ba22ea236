use task_monitor_lib::config::AppConfig;
use task_monitor_lib::control::TaskMonitor;
use task_monitor_lib::delta::compute_process_delta;
use task_monitor_lib::error::MonitorError;
use task_monitor_lib::model::{ProcessType, RawProcessSample, RawThreadSample, RawWindowSample};
use task_monitor_lib::provider::{StaticProvider, StaticRegistry};
use task_monitor_lib::view::{RowId, RowKind, RowPayload};

fn process(pid: i64, process_type: ProcessType, memory: u64, cpu_ns: u64) -> RawProcessSample {
    let mut sample = RawProcessSample::new(pid, process_type);
    sample.memory_bytes = memory;
    sample.cpu_time_ns = cpu_ns;
    sample
}

fn thread(tid: i64, name: &str, cpu_ns: u64) -> RawThreadSample {
    RawThreadSample {
        tid,
        name: name.to_string(),
        cpu_time_ns: cpu_ns,
        cpu_cycle_count: 0,
    }
}

fn window(outer_window_id: u64, uri: &str, title: &str) -> RawWindowSample {
    RawWindowSample {
        outer_window_id,
        document_uri: uri.to_string(),
        document_title: title.to_string(),
        is_process_root: true,
        is_in_process: true,
    }
}

fn monitor_with(snapshots: Vec<Vec<RawProcessSample>>) -> TaskMonitor<StaticProvider, StaticRegistry> {
    let mut provider = StaticProvider::new();
    for snapshot in snapshots {
        provider.push(snapshot);
    }
    TaskMonitor::new(provider, StaticRegistry::new(), AppConfig::default())
}

fn keys(monitor: &TaskMonitor<StaticProvider, StaticRegistry>) -> Vec<String> {
    monitor.view().descriptors().into_iter().map(|d| d.key).collect()
}

#[test]
fn test_end_to_end_delta() {
    let mut monitor = monitor_with(vec![
        vec![process(100, ProcessType::Browser, 50_000_000, 1_000_000)],
        vec![process(100, ProcessType::Browser, 60_000_000, 1_500_000)],
    ]);

    monitor.update_at(true, 0.0).unwrap();
    let first = &monitor.counters()[0];
    assert_eq!(first.slope_cpu, None);
    assert_eq!(first.delta_ram_bytes, None);
    let row = &monitor.view().descriptors()[0];
    assert_eq!(row.fields[2], "(measuring)");

    monitor.update_at(true, 1000.0).unwrap();
    let delta = &monitor.counters()[0];
    assert_eq!(delta.delta_ram_bytes, Some(10_000_000));
    let slope = delta.slope_cpu.unwrap();
    assert!((slope - 0.0005).abs() < 1e-12);
    assert!(delta.active);
    assert_eq!(monitor.view().descriptors()[0].fields[2], "0.05%");
}

#[test]
fn test_provider_failure_propagates() {
    let mut provider = StaticProvider::new();
    provider.push(vec![process(1, ProcessType::Browser, 10, 0)]);
    provider.push_failure("browser went away");
    let mut monitor = TaskMonitor::new(provider, StaticRegistry::new(), AppConfig::default());

    monitor.update_at(true, 0.0).unwrap();
    let err = monitor.update_at(true, 2000.0).unwrap_err();
    assert!(matches!(err, MonitorError::ProviderFailed(_)));

    // Nothing was committed by the failed cycle.
    let latest = monitor.source().latest().unwrap();
    assert_eq!(latest.taken_at_ms, 0.0);
    assert!(monitor.source().previous().is_none());
    assert_eq!(keys(&monitor), vec!["p:1"]);
}

#[test]
fn test_fresh_snapshot_is_not_refetched() {
    let mut monitor = monitor_with(vec![
        vec![process(1, ProcessType::Browser, 10, 0)],
        vec![process(1, ProcessType::Browser, 10, 0)],
    ]);
    monitor.update_at(false, 0.0).unwrap();
    monitor.update_at(false, 500.0).unwrap();
    monitor.update_at(false, 1000.0).unwrap();
    assert_eq!(monitor.source().provider().requests(), 1);

    monitor.update_at(false, 1001.0).unwrap();
    assert_eq!(monitor.source().provider().requests(), 2);
}

#[test]
fn test_unchanged_cycle_moves_nothing() {
    let snapshot = || {
        vec![
            process(1, ProcessType::Browser, 300, 0),
            process(2, ProcessType::Gpu, 200, 0),
            process(3, ProcessType::Preallocated, 100, 0),
        ]
    };
    let mut monitor = monitor_with(vec![snapshot(), snapshot()]);

    let first = monitor.update_at(true, 0.0).unwrap();
    assert_eq!(first.stats.inserted, 3);
    let handles: Vec<_> = monitor.view().rows().map(|r| r.handle()).collect();

    let second = monitor.update_at(true, 2000.0).unwrap();
    assert!(second.stats.is_noop());
    let again: Vec<_> = monitor.view().rows().map(|r| r.handle()).collect();
    assert_eq!(handles, again);
}

#[test]
fn test_grouped_order_separates_ranks() {
    let mut web = process(2, ProcessType::WebIsolated, 100, 0);
    web.origin = "https://example.org".to_string();
    web.child_id = Some(2);
    web.windows = vec![window(7, "https://example.org/", "Example")];
    let snapshot = vec![
        process(4, ProcessType::Preallocated, 10, 0),
        process(3, ProcessType::Gpu, 10, 0),
        web,
        process(1, ProcessType::Browser, 10, 0),
    ];

    let mut provider = StaticProvider::new();
    provider.push(snapshot);
    let mut registry = StaticRegistry::new();
    registry.insert_tab(7, "Example");
    let mut monitor = TaskMonitor::new(provider, registry, AppConfig::default());
    monitor.update_at(true, 0.0).unwrap();

    let rows = monitor.view().descriptors();
    let order: Vec<&str> = rows.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(order, vec!["p:1", "p:2", "w:7", "p:3", "p:4"]);
    let separated: Vec<bool> = rows.iter().map(|d| d.separate_from_previous).collect();
    assert_eq!(separated, vec![false, true, false, true, true]);
    assert_eq!(rows[2].kind, RowKind::Window);
    assert_eq!(rows[2].fields[0], "Tab: Example");
}

#[test]
fn test_sorted_columns_reverse_exactly() {
    let snapshot = vec![
        process(1, ProcessType::Browser, 300, 0),
        process(2, ProcessType::Gpu, 100, 0),
        process(3, ProcessType::Socket, 200, 0),
        process(4, ProcessType::Rdd, 200, 0),
    ];
    let mut monitor = monitor_with(vec![snapshot]);
    monitor.update_at(true, 0.0).unwrap();

    monitor.set_sort_key(Some("memory-resident"), true).unwrap();
    monitor.update_display(true).unwrap();
    let ascending = keys(&monitor);
    assert_eq!(ascending, vec!["p:1", "p:3", "p:4", "p:2"]);
    assert!(monitor.view().descriptors().iter().all(|d| !d.separate_from_previous));

    monitor.update_display(true).unwrap();
    assert_eq!(keys(&monitor), ascending);

    monitor.set_sort_key(Some("column-memory-resident"), false).unwrap();
    monitor.update_display(true).unwrap();
    let mut reversed = ascending.clone();
    reversed.reverse();
    assert_eq!(keys(&monitor), reversed);
}

#[test]
fn test_unsupported_sort_key_is_rejected() {
    let mut monitor = monitor_with(vec![]);
    monitor.set_sort_key(Some("cpu-total"), false).unwrap();
    let err = monitor.set_sort_key(Some("pids"), true).unwrap_err();
    assert!(matches!(err, MonitorError::UnsupportedSortColumn(_)));
    let order = monitor.sort_order();
    assert!(!order.ascending);
    assert_eq!(order.column.map(|c| c.key()), Some("cpu-total"));
}

#[test]
fn test_quiet_window_freezes_row_order() {
    let mut monitor = monitor_with(vec![
        vec![
            process(1, ProcessType::Gpu, 200, 0),
            process(2, ProcessType::Rdd, 100, 0),
        ],
        vec![
            process(1, ProcessType::Gpu, 100, 0),
            process(2, ProcessType::Rdd, 200, 4_000_000),
        ],
    ]);
    monitor.set_sort_key(Some("memory-resident"), true).unwrap();
    monitor.update_at(true, 0.0).unwrap();
    assert_eq!(keys(&monitor), vec!["p:1", "p:2"]);

    monitor.note_user_interaction();
    assert!(!monitor.quiet_remaining().is_zero());
    let report = monitor.update_at(false, 2000.0).unwrap();
    assert!(!report.reordered);
    assert_eq!(keys(&monitor), vec!["p:1", "p:2"]);
    // Figures keep updating while the order is frozen.
    assert_eq!(monitor.view().descriptors()[1].fields[2], "0.2%");
    let row = monitor.view().row(&RowId::Process(2)).unwrap();
    match &row.payload {
        RowPayload::Process(data) => {
            assert_eq!(data.slope_cpu, Some(0.002));
            assert_eq!(data.total_cpu_ns, 4_000_000);
        }
        other => panic!("unexpected payload {other:?}"),
    }

    let report = monitor.update_display(true).unwrap();
    assert!(report.reordered);
    assert_eq!(keys(&monitor), vec!["p:2", "p:1"]);
}

#[test]
fn test_hang_reports_last_one_cycle() {
    let mut web = process(5, ProcessType::Web, 100, 0);
    web.child_id = Some(9);
    let mut monitor = monitor_with(vec![vec![web]]);
    monitor.update_at(true, 0.0).unwrap();

    monitor.report_hang(9);
    monitor.update_display(true).unwrap();
    assert!(monitor.view().descriptors()[0].hung);
    assert!(monitor.counters()[0].is_hung);

    monitor.update_display(true).unwrap();
    assert!(!monitor.view().descriptors()[0].hung);
}

#[test]
fn test_thread_list_expands_and_collapses() {
    let sample = |cpu: u64| {
        let mut browser = process(1, ProcessType::Browser, 100, cpu);
        browser.threads = vec![thread(11, "Main", cpu), thread(12, "", 0)];
        vec![browser]
    };
    let mut monitor = monitor_with(vec![sample(0), sample(2_000_000)]);
    monitor.update_at(true, 0.0).unwrap();
    monitor.update_at(true, 1000.0).unwrap();
    assert_eq!(keys(&monitor), vec!["p:1", "ts:1"]);
    let summary = &monitor.view().descriptors()[1];
    assert_eq!(summary.kind, RowKind::ThreadSummary);
    assert_eq!(summary.pid, Some(1));

    assert_eq!(monitor.toggle_threads(1).unwrap(), Some(true));
    assert_eq!(keys(&monitor), vec!["p:1", "ts:1", "t:11", "t:12"]);
    let rows = monitor.view().descriptors();
    assert_eq!(rows[3].fields[0], "(12)");
    assert_eq!(rows[2].fields[1], "0.2%");
    assert_eq!(rows[3].fields[1], "idle");

    assert_eq!(monitor.toggle_threads(1).unwrap(), Some(false));
    assert_eq!(keys(&monitor), vec!["p:1", "ts:1"]);
    assert_eq!(monitor.toggle_threads(42).unwrap(), None);
}

#[test]
fn test_registry_refreshed_once_per_cycle() {
    let mut monitor = monitor_with(vec![
        vec![process(1, ProcessType::Browser, 1, 0)],
        vec![process(1, ProcessType::Browser, 1, 0)],
    ]);
    monitor.update_at(true, 0.0).unwrap();
    monitor.update_at(true, 2000.0).unwrap();
    assert_eq!(monitor.registry_mut().refreshes(), 2);
}

#[test]
fn test_pid_mismatch_is_an_error() {
    let registry = StaticRegistry::new();
    let cur = process(1, ProcessType::Browser, 1, 0);
    let prev = process(2, ProcessType::Browser, 1, 0);
    let err = compute_process_delta(&cur, Some(&prev), &registry).unwrap_err();
    assert!(matches!(
        err,
        MonitorError::PidMismatch {
            current: 1,
            previous: 2
        }
    ));
}
