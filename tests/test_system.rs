use task_monitor_lib::control::TaskMonitor;
use task_monitor_lib::config::AppConfig;
use task_monitor_lib::error::MonitorError;
use task_monitor_lib::model::ProcessType;
use task_monitor_lib::provider::{ProcessInfoProvider, StaticRegistry};
use task_monitor_lib::system::SystemProvider;

/// Executable name of this test binary without cargo's hash suffix.
fn own_name() -> String {
    let exe = std::env::current_exe().unwrap();
    let stem = exe.file_stem().unwrap().to_string_lossy().into_owned();
    match stem.rsplit_once('-') {
        Some((name, _hash)) => name.to_string(),
        None => stem,
    }
}

#[test]
fn test_missing_browser_is_a_provider_failure() {
    let mut provider = SystemProvider::new("no-such-browser-on-this-host");
    let err = provider.request_snapshot().unwrap_err();
    assert!(matches!(err, MonitorError::ProviderFailed(_)));
}

#[test]
fn test_own_process_tree_is_sampled() {
    let mut provider = SystemProvider::new(&own_name());
    let samples = provider.request_snapshot().unwrap();
    assert!(!samples.is_empty());
    assert_eq!(samples[0].process_type, ProcessType::Browser);
    assert_eq!(samples[0].child_id, None);
    assert!(samples[0].memory_bytes > 0);
}

#[test]
fn test_monitor_over_live_provider_no_panic() {
    let mut config = AppConfig::default();
    config.browser_process_name = own_name();
    let provider = SystemProvider::new(&config.browser_process_name);
    let mut monitor = TaskMonitor::new(provider, StaticRegistry::new(), config);

    monitor.update(true).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(50));
    let report = monitor.update(true).unwrap();
    assert!(report.processes >= 1);
    assert!(monitor.counters().iter().all(|p| p.slope_cpu.is_some()));
    assert!(monitor.summary().totals.total_memory > 0.0);
}
