//! Unit selection and text formatting for CPU time, memory and percentages.

use crate::error::{MonitorError, Result};

pub const NS_PER_US: f64 = 1000.0;
pub const NS_PER_MS: f64 = 1000.0 * 1000.0;
pub const NS_PER_S: f64 = 1000.0 * 1000.0 * 1000.0;
pub const NS_PER_MIN: f64 = NS_PER_S * 60.0;
pub const NS_PER_HOUR: f64 = NS_PER_MIN * 60.0;
pub const NS_PER_DAY: f64 = NS_PER_HOUR * 24.0;

pub const ONE_GIGA: f64 = 1024.0 * 1024.0 * 1024.0;
pub const ONE_MEGA: f64 = 1024.0 * 1024.0;
pub const ONE_KILO: f64 = 1024.0;

/// An amount expressed in a chosen unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaled {
    pub amount: f64,
    pub unit: &'static str,
}

/// Pick the largest duration unit the value does not fit below.
pub fn format_duration(raw_ns: f64) -> Scaled {
    let (amount, unit) = if raw_ns <= NS_PER_US {
        (raw_ns, "ns")
    } else if raw_ns <= NS_PER_MS {
        (raw_ns / NS_PER_US, "µs")
    } else if raw_ns <= NS_PER_S {
        (raw_ns / NS_PER_MS, "ms")
    } else if raw_ns <= NS_PER_MIN {
        (raw_ns / NS_PER_S, "s")
    } else if raw_ns <= NS_PER_HOUR {
        (raw_ns / NS_PER_MIN, "m")
    } else if raw_ns <= NS_PER_DAY {
        (raw_ns / NS_PER_HOUR, "h")
    } else {
        (raw_ns / NS_PER_DAY, "d")
    };
    Scaled { amount, unit }
}

/// Pick a 1024-based memory unit. `None` means the amount is not known yet.
pub fn format_memory(value: Option<f64>) -> Scaled {
    let Some(value) = value else {
        return Scaled {
            amount: 0.0,
            unit: "?",
        };
    };
    let abs = value.abs();
    if abs >= ONE_GIGA {
        Scaled {
            amount: value / ONE_GIGA,
            unit: "GB",
        }
    } else if abs >= ONE_MEGA {
        Scaled {
            amount: value / ONE_MEGA,
            unit: "MB",
        }
    } else if abs >= ONE_KILO {
        Scaled {
            amount: value / ONE_KILO,
            unit: "KB",
        }
    } else {
        Scaled {
            amount: value,
            unit: "B",
        }
    }
}

/// Memory with one decimal, as shown in tooltips (`47.7MB`).
pub fn memory_with_unit(bytes: f64) -> String {
    let scaled = format_memory(Some(bytes));
    format!("{:.1}{}", scaled.amount, scaled.unit)
}

/// A fraction rendered as a percentage with at most two significant digits.
pub fn format_percent(fraction: f64) -> String {
    let value = fraction * 100.0;
    if value == 0.0 || !value.is_finite() {
        return "0%".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    let step = 10f64.powi(magnitude - 1);
    let rounded = (value / step).round() * step;
    let decimals = (1 - magnitude).max(0) as usize;
    let mut text = format!("{:.*}", decimals, rounded);
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{}%", text)
}

/// Read back an amount such as `12.5 MB`, `300KB` or `42`.
///
/// Failures are logged and yield `None`; use [`try_parse_memory_string`]
/// to get the error instead.
pub fn parse_memory_string(text: &str) -> Option<f64> {
    match try_parse_memory_string(text) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::error!("{}", e);
            None
        }
    }
}

pub fn try_parse_memory_string(text: &str) -> Result<f64> {
    let invalid = || MonitorError::InvalidMemoryString(text.to_string());
    let mut rest = text.trim();
    if let Some(stripped) = rest.strip_suffix(['B', 'b']) {
        rest = stripped;
    }
    let multiplier = match rest.chars().last() {
        Some('K' | 'k') => ONE_KILO,
        Some('M' | 'm') => ONE_MEGA,
        Some('G' | 'g') => ONE_GIGA,
        _ => 1.0,
    };
    if multiplier != 1.0 {
        rest = &rest[..rest.len() - 1];
    }
    let number = rest.trim_end();

    let (int_part, frac_part) = match number.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (number, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || frac_part.is_some_and(|f| !all_digits(f)) {
        return Err(invalid());
    }
    let value: f64 = number.parse().map_err(|_| invalid())?;
    Ok(value * multiplier)
}
