//! Basic usage example for TaskMonitor
//!
//! Runs a few display cycles over synthetic snapshots, then samples the
//! real browser process tree if one is running.

use task_monitor_lib::config::AppConfig;
use task_monitor_lib::control::TaskMonitor;
use task_monitor_lib::model::{ProcessType, RawProcessSample, RawThreadSample, RawWindowSample};
use task_monitor_lib::provider::{StaticProvider, StaticRegistry};
use task_monitor_lib::system::SystemProvider;
use std::thread;

fn sample(pid: i64, process_type: ProcessType, cpu_ms: u64, memory_mb: u64) -> RawProcessSample {
    let mut sample = RawProcessSample::new(pid, process_type);
    sample.cpu_time_ns = cpu_ms * 1_000_000;
    sample.memory_bytes = memory_mb * 1024 * 1024;
    sample
}

fn synthetic_snapshot(step: u64) -> Vec<RawProcessSample> {
    let mut browser = sample(100, ProcessType::Browser, 900 + step * 40, 320);
    browser.threads = vec![
        RawThreadSample {
            tid: 101,
            name: "Renderer".to_string(),
            cpu_time_ns: (500 + step * 30) * 1_000_000,
            cpu_cycle_count: 0,
        },
        RawThreadSample {
            tid: 102,
            name: "DOM Worker #1".to_string(),
            cpu_time_ns: 200 * 1_000_000,
            cpu_cycle_count: 0,
        },
    ];

    let mut web = sample(200, ProcessType::WebIsolated, 300 + step * 250, 180 + step * 5);
    web.child_id = Some(2);
    web.origin = "https://example.org".to_string();
    web.windows = vec![RawWindowSample {
        outer_window_id: 7,
        document_uri: "https://example.org/".to_string(),
        document_title: "Example Domain".to_string(),
        is_process_root: true,
        is_in_process: true,
    }];

    let mut gpu = sample(300, ProcessType::Gpu, 50 + step * 10, 90);
    gpu.child_id = Some(3);
    vec![browser, web, gpu]
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Task Monitor Example");
    println!("====================");

    let mut provider = StaticProvider::new();
    for step in 0..3 {
        provider.push(synthetic_snapshot(step));
    }
    let mut registry = StaticRegistry::default();
    registry.insert_tab(7, "Example Domain");

    let mut monitor = TaskMonitor::new(provider, registry, AppConfig::default());
    for step in 0..3 {
        // One second between synthetic samples.
        match monitor.update_at(true, step as f64 * 1000.0) {
            Ok(report) => println!(
                "\nCycle {}: {} processes, {} inserted, {} moved, {} removed",
                step, report.processes, report.stats.inserted, report.stats.moved, report.stats.removed
            ),
            Err(e) => println!("Cycle {} failed: {}", step, e),
        }
        for row in monitor.view().descriptors() {
            println!("  {:<8} {}", row.key, row.fields.join(" | "));
        }
    }

    let summary = monitor.summary();
    println!("\nTotals: {:.1}% CPU, {:.0} bytes", summary.totals.total_cpu, summary.totals.total_memory);
    println!("Tooltip:\n{}", summary.tooltip);

    println!("\nLive browser processes:");
    let config = AppConfig::load();
    let provider = SystemProvider::new(&config.browser_process_name);
    let mut live = TaskMonitor::new(provider, StaticRegistry::default(), config);
    for _ in 0..2 {
        if let Err(e) = live.update(true) {
            println!("  {}", e);
            return;
        }
        thread::sleep(live.config().minimum_interval());
    }
    for line in live.summary().tooltip.lines() {
        println!("  {}", line);
    }
}
