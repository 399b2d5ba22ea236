//! Per-process CPU and memory monitoring for a multi-process browser.
//!
//! The pipeline runs in cycles: [`snapshot`] samples the provider,
//! [`delta`] turns two snapshots into rates, [`sort`] orders them,
//! [`view`] reconciles the displayed rows and [`aggregate`] sums the
//! figures for the summary widget. [`control::TaskMonitor`] drives it.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod control;
pub mod delta;
pub mod error;
pub mod format;
pub mod model;
pub mod provider;
pub mod snapshot;
pub mod sort;
pub mod system;
pub mod view;
