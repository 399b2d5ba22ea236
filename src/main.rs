use eframe::egui::{self, CentralPanel, Color32};
use egui_extras::{Column, TableBuilder};
use egui_plot::{Line, Plot, PlotPoints};
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};
use task_monitor_lib::aggregate::Summary;
use task_monitor_lib::config::{parse_css_color, AppConfig};
use task_monitor_lib::control::TaskMonitor;
use task_monitor_lib::error::Result;
use task_monitor_lib::format::memory_with_unit;
use task_monitor_lib::provider::StaticRegistry;
use task_monitor_lib::sort::{SortColumn, SortOrder};
use task_monitor_lib::system::SystemProvider;
use task_monitor_lib::view::{RowDescriptor, RowKind};

type Monitor = TaskMonitor<SystemProvider, StaticRegistry>;

const HUNG_COLOR: Color32 = Color32::from_rgb(200, 0, 0);

fn config_color(text: &str, fallback: Color32) -> Color32 {
    match parse_css_color(text) {
        Some([r, g, b]) => Color32::from_rgb(r, g, b),
        None => {
            log::warn!("Unrecognised colour {:?} in config", text);
            fallback
        }
    }
}

/// Which descriptor field feeds the memory and CPU columns for a row kind.
fn value_columns(kind: RowKind) -> (Option<usize>, Option<usize>) {
    match kind {
        RowKind::Process => (Some(1), Some(2)),
        RowKind::Thread => (None, Some(1)),
        _ => (None, None),
    }
}

fn thread_summary_pid(row: &RowDescriptor) -> Option<i64> {
    match row.kind {
        RowKind::ThreadSummary => row.pid,
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
enum Theme {
    Light,
    Dark,
}

enum RowAction {
    Sort(SortColumn),
    ToggleThreads(i64),
}

pub struct TaskMonitorApp {
    monitor: Arc<Mutex<Monitor>>,
    config: AppConfig,
    update_interval_ms: u32,
    update_interval_atomic: Arc<AtomicU32>,
    last_refresh_time: Option<Instant>,
    last_refresh_time_atomic: Arc<Mutex<Option<Instant>>>,
    last_error: Arc<Mutex<Option<String>>>,
    rows: Vec<RowDescriptor>,
    summary: Summary,
    sort: SortOrder,
    quiet_remaining: Duration,
    // Historical data for charts
    cpu_history: VecDeque<(f64, f64)>,    // (time, cpu percent)
    memory_history: VecDeque<(f64, f64)>, // (time, memory MB)
    history_start_time: Instant,
    max_history_points: usize,
    last_history_sample: Option<Instant>,
    theme: Theme,
    paused: bool,
    window_size: Option<(f32, f32)>,
    window_pos: Option<(f32, f32)>,
}

impl Default for TaskMonitorApp {
    fn default() -> Self {
        let config = AppConfig::load();
        let update_interval_ms = config.update_interval_ms.min(u32::MAX as u64) as u32;
        let theme = match config.theme.as_str() {
            "Light" => Theme::Light,
            _ => Theme::Dark,
        };
        let provider = SystemProvider::new(&config.browser_process_name);
        let monitor = TaskMonitor::new(provider, StaticRegistry::default(), config.clone());

        Self {
            monitor: Arc::new(Mutex::new(monitor)),
            update_interval_ms,
            update_interval_atomic: Arc::new(AtomicU32::new(update_interval_ms)),
            last_refresh_time: None,
            last_refresh_time_atomic: Arc::new(Mutex::new(None)),
            last_error: Arc::new(Mutex::new(None)),
            rows: Vec::new(),
            summary: Summary::default(),
            sort: SortOrder::default(),
            quiet_remaining: Duration::ZERO,
            cpu_history: VecDeque::with_capacity(300),
            memory_history: VecDeque::with_capacity(300),
            history_start_time: Instant::now(),
            max_history_points: 300,
            last_history_sample: None,
            theme,
            paused: false,
            window_size: config
                .window_width
                .and_then(|w| config.window_height.map(|h| (w, h))),
            window_pos: config
                .window_x
                .and_then(|x| config.window_y.map(|y| (x, y))),
            config,
        }
    }
}

impl TaskMonitorApp {
    fn export_to_json(&self) {
        use serde_json::json;
        let data = json!({
            "timestamp": std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            "summary": self.summary,
            "rows": self.rows,
        });
        match serde_json::to_string_pretty(&data) {
            Ok(json_str) => log::info!("Export data:\n{}", json_str),
            Err(e) => log::error!("JSON export failed: {}", e),
        }
    }

    fn export_to_csv(&self) {
        let mut wtr = csv::Writer::from_writer(vec![]);
        if let Err(e) = wtr.write_record(["Kind", "Key", "Name", "Memory", "CPU", "Hung"]) {
            log::error!("CSV export failed: {}", e);
            return;
        }
        for row in &self.rows {
            let (memory, cpu) = value_columns(row.kind);
            let field = |i: Option<usize>| {
                i.and_then(|i| row.fields.get(i))
                    .cloned()
                    .unwrap_or_default()
            };
            let kind = serde_json::to_value(row.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let _ = wtr.write_record([
                kind,
                row.key.clone(),
                field(Some(0)),
                field(memory),
                field(cpu),
                row.hung.to_string(),
            ]);
        }
        if let Ok(data) = wtr.into_inner() {
            if let Ok(csv_str) = String::from_utf8(data) {
                log::info!("CSV Export:\n{}", csv_str);
            }
        }
    }

    /// Copy what the frame needs out of the monitor, holding the lock briefly.
    fn pull_from_monitor(&mut self) {
        let mon = match self.monitor.lock() {
            Ok(mon) => mon,
            Err(e) => {
                log::error!("Failed to acquire monitor lock: {}", e);
                return;
            }
        };
        self.rows = mon.view().descriptors();
        self.summary = mon.summary();
        self.sort = mon.sort_order();
        self.quiet_remaining = mon.quiet_remaining();
    }

    fn record_history(&mut self) {
        let due = self
            .last_history_sample
            .map_or(true, |at| at.elapsed() >= Duration::from_millis(self.update_interval_ms as u64));
        if !due || self.summary.tasks.is_empty() {
            return;
        }
        self.last_history_sample = Some(Instant::now());
        let elapsed_secs = self.history_start_time.elapsed().as_secs_f64();
        self.cpu_history
            .push_back((elapsed_secs, self.summary.totals.total_cpu));
        self.memory_history
            .push_back((elapsed_secs, self.summary.totals.total_memory / 1024.0 / 1024.0));
        while self.cpu_history.len() > self.max_history_points {
            self.cpu_history.pop_front();
        }
        while self.memory_history.len() > self.max_history_points {
            self.memory_history.pop_front();
        }
    }

    fn apply(&self, action: RowAction) -> Result<()> {
        let mut mon = self.monitor.lock()?;
        match action {
            RowAction::Sort(column) => {
                mon.toggle_sort(column)?;
            }
            RowAction::ToggleThreads(pid) => {
                mon.toggle_threads(pid)?;
            }
        }
        Ok(())
    }

    fn sort_header(&self, ui: &mut egui::Ui, label: &str, column: SortColumn) -> Option<RowAction> {
        let selected = self.sort.column == Some(column);
        let arrow = match (selected, self.sort.ascending) {
            (false, _) => "",
            (true, true) => " ▲",
            (true, false) => " ▼",
        };
        ui.selectable_label(selected, format!("{}{}", label, arrow))
            .clicked()
            .then_some(RowAction::Sort(column))
    }
}

impl eframe::App for TaskMonitorApp {
    fn save(&mut self, _storage: &mut dyn eframe::Storage) {
        let mut config = AppConfig::load();
        config.update_interval_ms = self.update_interval_ms as u64;
        config.theme = match self.theme {
            Theme::Light => "Light".to_string(),
            Theme::Dark => "Dark".to_string(),
        };
        if let Some((w, h)) = self.window_size {
            config.window_width = Some(w);
            config.window_height = Some(h);
        }
        if let Some((x, y)) = self.window_pos {
            config.window_x = Some(x);
            config.window_y = Some(y);
        }
        if let Err(e) = config.save() {
            log::warn!("Could not save config: {}", e);
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let style = match self.theme {
            Theme::Dark => egui::Visuals::dark(),
            Theme::Light => egui::Visuals::light(),
        };
        ctx.set_visuals(style);

        ctx.input(|i| {
            if let Some(rect) = i.viewport().inner_rect {
                self.window_size = Some((rect.width(), rect.height()));
                self.window_pos = Some((rect.min.x, rect.min.y));
            }
        });

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                ui.label("Update interval:");
                let interval_options = [1000, 2000, 5000, 10000];
                egui::ComboBox::from_id_salt("interval_combo_box")
                    .selected_text(format!("{} s", self.update_interval_ms / 1000))
                    .show_ui(ui, |ui| {
                        for &val in &interval_options {
                            ui.selectable_value(
                                &mut self.update_interval_ms,
                                val,
                                format!("{} s", val / 1000),
                            );
                        }
                    });
                self.update_interval_atomic
                    .store(self.update_interval_ms, Ordering::Relaxed);

                ui.separator();
                ui.checkbox(&mut self.paused, "⏸ Pause Updates");

                if ui
                    .add_enabled(!self.paused, egui::Button::new("🔄 Refresh"))
                    .clicked()
                {
                    if let Ok(mut mon) = self.monitor.lock() {
                        if let Err(e) = mon.update(true) {
                            log::warn!("Forced update failed: {}", e);
                        }
                    }
                    let now = Instant::now();
                    self.last_refresh_time = Some(now);
                    if let Ok(mut time) = self.last_refresh_time_atomic.lock() {
                        *time = Some(now);
                    }
                    ctx.request_repaint();
                }

                if let Ok(time) = self.last_refresh_time_atomic.lock() {
                    if let Some(refresh_time) = *time {
                        self.last_refresh_time = Some(refresh_time);
                    }
                }
                match self.last_refresh_time {
                    Some(refresh_time) => {
                        ui.label(format!("Last sample: {}s ago", refresh_time.elapsed().as_secs()))
                    }
                    None => ui.label("Last sample: Never"),
                };

                ui.separator();
                let theme_text = match self.theme {
                    Theme::Dark => "🌙 Dark",
                    Theme::Light => "☀️ Light",
                };
                if ui.button(theme_text).clicked() {
                    self.theme = match self.theme {
                        Theme::Dark => Theme::Light,
                        Theme::Light => Theme::Dark,
                    };
                }

                if !self.quiet_remaining.is_zero() {
                    ui.separator();
                    ui.label(format!(
                        "Order frozen for {:.1}s",
                        self.quiet_remaining.as_secs_f64()
                    ));
                }
            });
        });

        if !self.paused {
            self.pull_from_monitor();
            self.record_history();
        }
        ctx.request_repaint_after(Duration::from_millis(500));

        let error = self.last_error.lock().ok().and_then(|e| e.clone());
        let cpu_color = config_color(&self.config.all_cpu_color, Color32::LIGHT_RED);
        let mem_color = config_color(&self.config.all_mem_color, Color32::LIGHT_BLUE);
        let tab_cpu_color = config_color(&self.config.tab_cpu_color, Color32::LIGHT_RED);
        let tab_mem_color = config_color(&self.config.tab_mem_color, Color32::LIGHT_BLUE);
        let mut action = None;

        CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                if let Some(error) = &error {
                    ui.colored_label(HUNG_COLOR, format!("No data: {}", error));
                }

                ui.columns(2, |columns| {
                    columns[0].group(|ui| {
                        ui.heading("Browser CPU");
                        let totals = self.summary.totals;
                        ui.colored_label(cpu_color, format!("{:.0}%", totals.total_cpu));
                        ui.add(
                            egui::ProgressBar::new((self.summary.cpu_height / 100.0) as f32)
                                .fill(cpu_color),
                        );
                        if !self.cpu_history.is_empty() {
                            let points: PlotPoints = self.cpu_history.iter()
                                .map(|(t, v)| [*t, *v])
                                .collect();
                            Plot::new("cpu_history")
                                .height(100.0)
                                .show_axes([false, false])
                                .show(ui, |plot_ui| {
                                    plot_ui.line(Line::new(points).color(cpu_color));
                                });
                        }
                    });

                    columns[1].group(|ui| {
                        ui.heading("Browser Memory");
                        let totals = self.summary.totals;
                        ui.colored_label(mem_color, memory_with_unit(totals.total_memory));
                        ui.add(
                            egui::ProgressBar::new((self.summary.memory_height / 100.0) as f32)
                                .fill(mem_color),
                        );
                        if !self.memory_history.is_empty() {
                            let points: PlotPoints = self.memory_history.iter()
                                .map(|(t, v)| [*t, *v])
                                .collect();
                            Plot::new("memory_history")
                                .height(100.0)
                                .show_axes([false, false])
                                .show(ui, |plot_ui| {
                                    plot_ui.line(Line::new(points).color(mem_color));
                                });
                        }
                    });
                });

                ui.add_space(10.0);
                ui.collapsing("Top processes", |ui| {
                    for item in self.summary.menu.iter().filter(|item| !item.hidden) {
                        ui.monospace(item.label.as_str()).on_hover_text(item.tooltip.as_str());
                    }
                    if self.summary.hidden_lines > 0 {
                        ui.label(format!(
                            "… {} more ({})",
                            self.summary.hidden_lines,
                            memory_with_unit(self.summary.hidden_memory)
                        ));
                    }
                });

                ui.add_space(10.0);
                ui.separator();

                let table = ui.group(|ui| {
                    ui.heading("Processes");
                    egui::ScrollArea::horizontal().show(ui, |ui| {
                        TableBuilder::new(ui)
                            .striped(true)
                            .resizable(true)
                            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
                            .column(Column::initial(420.0).at_least(150.0)) // Name
                            .column(Column::initial(110.0)) // Memory
                            .column(Column::initial(110.0)) // CPU
                            .column(Column::initial(120.0)) // Bars
                        .header(30.0, |mut header| {
                            header.col(|ui| {
                                action = action.take().or(self.sort_header(ui, "Name", SortColumn::Name));
                            });
                            header.col(|ui| {
                                action = action
                                    .take()
                                    .or(self.sort_header(ui, "Memory", SortColumn::MemoryResident));
                            });
                            header.col(|ui| {
                                action = action.take().or(self.sort_header(ui, "CPU", SortColumn::CpuTotal));
                            });
                            header.col(|ui| { ui.label(""); });
                        })
                        .body(|mut body| {
                            for row in &self.rows {
                                if row.separate_from_previous {
                                    body.row(6.0, |mut sep| {
                                        for _ in 0..4 {
                                            sep.col(|ui| { ui.separator(); });
                                        }
                                    });
                                }
                                let (memory, cpu) = value_columns(row.kind);
                                body.row(26.0, |mut table_row| {
                                    table_row.col(|ui| {
                                        let name = row.fields.first().cloned().unwrap_or_default();
                                        let indent = if row.kind == RowKind::Process { "" } else { "    " };
                                        let text = format!("{}{}", indent, name);
                                        let response = match row.kind {
                                            RowKind::ThreadSummary => {
                                                let marker = if row.open { "▾ " } else { "▸ " };
                                                ui.selectable_label(row.open, format!("{}{}", marker, text))
                                            }
                                            _ if row.hung => ui.colored_label(HUNG_COLOR, text),
                                            _ => ui.label(text),
                                        };
                                        if let Some(Some(title)) = row.titles.first() {
                                            response.clone().on_hover_text(title.as_str());
                                        }
                                        if response.clicked() {
                                            if let Some(pid) = thread_summary_pid(row) {
                                                action = Some(RowAction::ToggleThreads(pid));
                                            }
                                        }
                                    });
                                    for column in [memory, cpu] {
                                        table_row.col(|ui| {
                                            let Some(i) = column else { return };
                                            let text = row.fields.get(i).cloned().unwrap_or_default();
                                            let response = ui.label(text);
                                            if let Some(Some(title)) = row.titles.get(i) {
                                                response.on_hover_text(title.as_str());
                                            }
                                        });
                                    }
                                    table_row.col(|ui| {
                                        if row.kind != RowKind::Process {
                                            return;
                                        }
                                        if row.cpu_bar > 0.0 {
                                            ui.add(
                                                egui::ProgressBar::new((row.cpu_bar / 100.0) as f32)
                                                    .desired_width(50.0)
                                                    .fill(tab_cpu_color),
                                            );
                                        }
                                        ui.add(
                                            egui::ProgressBar::new((row.memory_bar / 100.0) as f32)
                                                .desired_width(50.0)
                                                .fill(tab_mem_color),
                                        );
                                    });
                                });
                            }
                        });
                    });
                });

                // Rows keep their order while the pointer moves over them.
                if table.response.contains_pointer() && ctx.input(|i| i.pointer.is_moving()) {
                    if let Ok(mut mon) = self.monitor.lock() {
                        mon.note_user_interaction();
                    }
                }

                ui.add_space(10.0);
                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("📥 Export to JSON").clicked() {
                        self.export_to_json();
                    }
                    if ui.button("📥 Export to CSV").clicked() {
                        self.export_to_csv();
                    }
                });
            });
        });

        if let Some(action) = action {
            if let Err(e) = self.apply(action) {
                log::warn!("Redisplay failed: {}", e);
            }
            self.pull_from_monitor();
            ctx.request_repaint();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = TaskMonitorApp::default();
    let monitor_clone = app.monitor.clone();
    let interval_atomic_clone = app.update_interval_atomic.clone();
    let refresh_time_clone = app.last_refresh_time_atomic.clone();
    let error_clone = app.last_error.clone();

    thread::spawn(move || loop {
        {
            match monitor_clone.lock() {
                Ok(mut locked_mon) => {
                    let outcome = locked_mon.update(false);
                    let message = match outcome {
                        Ok(report) => {
                            log::debug!(
                                "cycle: {} processes, {:?}, reordered: {}",
                                report.processes,
                                report.stats,
                                report.reordered
                            );
                            if let Ok(mut time) = refresh_time_clone.lock() {
                                *time = Some(Instant::now());
                            }
                            None
                        }
                        Err(e) => {
                            log::warn!("Update failed: {}", e);
                            Some(e.to_string())
                        }
                    };
                    if let Ok(mut slot) = error_clone.lock() {
                        *slot = message;
                    }
                }
                Err(e) => {
                    log::error!("Failed to acquire monitor lock in background thread: {}", e);
                }
            }
        }
        let interval_ms = interval_atomic_clone.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(interval_ms as u64));
    });

    let native_options = eframe::NativeOptions::default();
    let _ = eframe::run_native(
        "Task Monitor",
        native_options,
        Box::new(|_cc| Ok(Box::new(app))),
    );
}
