//! Rate-of-change computation between two samples of the same process.

use crate::classify::{classify, common_title, display_group_rank};
use crate::error::{MonitorError, Result};
use crate::format::NS_PER_MS;
use crate::model::{ProcessDelta, RawProcessSample, RawThreadSample, ThreadDelta};
use crate::provider::WindowRegistry;
use crate::snapshot::SnapshotPair;
use std::collections::HashMap;

/// Delta of one thread over `delta_t_ns` nanoseconds.
///
/// A thread first seen in this sample is measured from zero.
pub fn compute_thread_delta(
    cur: &RawThreadSample,
    prev: Option<&RawThreadSample>,
    delta_t_ns: Option<f64>,
) -> ThreadDelta {
    let name = if cur.name.is_empty() {
        format!("({})", cur.tid)
    } else {
        cur.name.clone()
    };
    let mut result = ThreadDelta {
        tid: cur.tid,
        name,
        total_cpu_ns: cur.cpu_time_ns,
        slope_cpu: None,
        active: false,
    };
    let Some(delta_t) = delta_t_ns.filter(|dt| *dt > 0.0) else {
        return result;
    };
    let prev_cpu = prev.map_or(0, |p| p.cpu_time_ns);
    let prev_cycles = prev.map_or(0, |p| p.cpu_cycle_count);
    let slope = (cur.cpu_time_ns as f64 - prev_cpu as f64) / delta_t;
    result.slope_cpu = Some(slope);
    result.active = slope != 0.0 || cur.cpu_cycle_count > prev_cycles;
    result
}

/// Derive the displayable record of a process from its current and
/// previous samples.
///
/// Fails with [`MonitorError::PidMismatch`] when `prev` describes another
/// process.
pub fn compute_process_delta(
    cur: &RawProcessSample,
    prev: Option<&RawProcessSample>,
    registry: &dyn WindowRegistry,
) -> Result<ProcessDelta> {
    let windows = classify(cur, registry);
    let display_rank = display_group_rank(&cur.process_type, &windows);
    let title = common_title(&windows);

    let mut result = ProcessDelta {
        pid: cur.pid,
        child_id: cur.child_id,
        total_ram_bytes: cur.memory_bytes,
        delta_ram_bytes: None,
        total_cpu_ns: cur.cpu_time_ns,
        slope_cpu: None,
        active: false,
        process_type: cur.process_type.clone(),
        origin: cur.origin.clone(),
        display_rank,
        windows,
        utility_actors: cur.utility_actors.clone(),
        threads: Vec::new(),
        title,
        is_hung: false,
    };

    let Some(prev) = prev else {
        result.threads = cur
            .threads
            .iter()
            .map(|thread| compute_thread_delta(thread, None, None))
            .collect();
        return Ok(result);
    };
    if prev.pid != cur.pid {
        return Err(MonitorError::PidMismatch {
            current: cur.pid,
            previous: prev.pid,
        });
    }

    let delta_t = (cur.sampled_at_ms - prev.sampled_at_ms) * NS_PER_MS;
    result.delta_ram_bytes = Some(cur.memory_bytes as i64 - prev.memory_bytes as i64);
    if delta_t > 0.0 {
        result.slope_cpu = Some((cur.cpu_time_ns as f64 - prev.cpu_time_ns as f64) / delta_t);
    }
    result.active = result.slope_cpu.is_some_and(|slope| slope != 0.0)
        || cur.cpu_cycle_count > prev.cpu_cycle_count;

    let prev_threads: HashMap<i64, &RawThreadSample> =
        prev.threads.iter().map(|t| (t.tid, t)).collect();
    result.threads = cur
        .threads
        .iter()
        .map(|thread| {
            compute_thread_delta(thread, prev_threads.get(&thread.tid).copied(), Some(delta_t))
        })
        .collect();
    Ok(result)
}

/// Deltas for every process of the latest snapshot, in snapshot order.
pub fn compute_counters(
    pair: &SnapshotPair,
    registry: &mut dyn WindowRegistry,
) -> Result<Vec<ProcessDelta>> {
    registry.refresh();
    let registry: &dyn WindowRegistry = registry;
    pair.latest
        .processes()
        .map(|cur| {
            let prev = pair.previous.as_ref().and_then(|snapshot| snapshot.get(cur.pid));
            compute_process_delta(cur, prev, registry)
        })
        .collect()
}
