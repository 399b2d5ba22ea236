use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Vertical scale of a pair of CPU/memory bars.
///
/// `cpu_max` is in percent of one core, `mem_max` in bytes. A value equal to
/// the max fills the bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarScale {
    pub cpu_max: f64,
    pub mem_max: f64,
}

impl BarScale {
    /// Height of the CPU bar in percent of the available height (0-100).
    pub fn cpu_height(&self, cpu_percent: f64) -> f64 {
        let height = if cpu_percent > 0.0 {
            cpu_percent * (100.0 / self.cpu_max)
        } else {
            0.0
        };
        height.min(100.0)
    }

    /// Height of the memory bar in percent of the available height (0-100).
    pub fn memory_height(&self, memory_bytes: f64) -> f64 {
        (memory_bytes / self.mem_max * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub minimum_interval_between_samples_ms: u64,
    pub update_interval_ms: u64,
    /// Quiet period after a pointer event during which rows are not reordered
    pub time_before_sorting_again_ms: u64,
    pub tab_cpu_color: String,
    pub tab_cpu_max: f64,
    pub tab_mem_color: String,
    pub tab_mem_max: f64,
    pub all_cpu_color: String,
    pub all_cpu_max: f64,
    pub all_mem_color: String,
    pub all_mem_max: f64,
    pub menu_task_count: usize,
    pub browser_process_name: String,
    pub theme: String,
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub window_x: Option<f32>,
    pub window_y: Option<f32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            minimum_interval_between_samples_ms: 1000,
            update_interval_ms: 2000,
            time_before_sorting_again_ms: 5000,
            tab_cpu_color: "#fd9191".to_string(),
            tab_cpu_max: 100.0,
            tab_mem_color: "rgb(100, 160, 255)".to_string(),
            tab_mem_max: 900.0 * 1000.0 * 1000.0,
            all_cpu_color: "#fd9191".to_string(),
            all_cpu_max: 200.0,
            all_mem_color: "rgb(100, 160, 255)".to_string(),
            all_mem_max: 1500.0 * 1000.0 * 1000.0,
            menu_task_count: 10,
            browser_process_name: "firefox".to_string(),
            theme: "Dark".to_string(),
            window_width: None,
            window_height: None,
            window_x: None,
            window_y: None,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("task-monitor");
        fs::create_dir_all(&path).ok();
        path.push("config.toml");
        path
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Read a config file, falling back to defaults when it is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            if let Ok(contents) = fs::read_to_string(path) {
                match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Ignoring malformed config {}: {}", path.display(), e),
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn minimum_interval(&self) -> Duration {
        Duration::from_millis(self.minimum_interval_between_samples_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.time_before_sorting_again_ms)
    }

    /// Scale of the bars drawn on each tab button.
    pub fn bar_scale(&self) -> BarScale {
        BarScale {
            cpu_max: self.tab_cpu_max,
            mem_max: self.tab_mem_max,
        }
    }

    /// Scale of the bars on the whole-browser summary widget.
    pub fn summary_scale(&self) -> BarScale {
        BarScale {
            cpu_max: self.all_cpu_max,
            mem_max: self.all_mem_max,
        }
    }
}

/// Parse a `#rrggbb` or `rgb(r, g, b)` colour as used in the config file.
pub fn parse_css_color(text: &str) -> Option<[u8; 3]> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some([channel(0)?, channel(2)?, channel(4)?]);
    }
    let inner = text.strip_prefix("rgb(")?.strip_suffix(')')?;
    let mut channels = inner.split(',').map(|c| c.trim().parse::<u8>().ok());
    let rgb = [channels.next()??, channels.next()??, channels.next()??];
    if channels.next().is_some() {
        return None;
    }
    Some(rgb)
}
