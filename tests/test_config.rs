use std::path::PathBuf;
use task_monitor_lib::config::AppConfig;

fn scratch_file(name: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("task-monitor-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.push(name);
    dir
}

#[test]
fn test_config_default() {
    let config = AppConfig::default();
    assert_eq!(config.minimum_interval_between_samples_ms, 1000);
    assert_eq!(config.update_interval_ms, 2000);
    assert_eq!(config.time_before_sorting_again_ms, 5000);
    assert_eq!(config.tab_cpu_max, 100.0);
    assert_eq!(config.tab_mem_max, 900e6);
    assert_eq!(config.all_cpu_max, 200.0);
    assert_eq!(config.all_mem_max, 1500e6);
    assert_eq!(config.menu_task_count, 10);
    assert_eq!(config.tab_cpu_color, "#fd9191");
    assert_eq!(config.tab_mem_color, "rgb(100, 160, 255)");
    assert_eq!(config.theme, "Dark");
}

#[test]
fn test_config_save_and_load() {
    let path = scratch_file("roundtrip.toml");
    let mut config = AppConfig::default();
    config.update_interval_ms = 5000;
    config.browser_process_name = "librewolf".to_string();
    config.theme = "Light".to_string();
    config.window_width = Some(800.0);
    config.window_height = Some(600.0);

    assert!(config.save_to(&path).is_ok());

    let loaded = AppConfig::load_from(&path);
    assert_eq!(loaded.update_interval_ms, 5000);
    assert_eq!(loaded.browser_process_name, "librewolf");
    assert_eq!(loaded.theme, "Light");
    assert_eq!(loaded.window_width, Some(800.0));
    assert_eq!(loaded.window_height, Some(600.0));
    assert_eq!(loaded.quiet_window().as_millis(), 5000);
}

#[test]
fn test_config_partial_file_keeps_defaults() {
    let path = scratch_file("partial.toml");
    std::fs::write(&path, "update_interval_ms = 3000\ntab_cpu_max = 50.0\n").unwrap();

    let loaded = AppConfig::load_from(&path);
    assert_eq!(loaded.update_interval_ms, 3000);
    assert_eq!(loaded.bar_scale().cpu_height(25.0), 50.0);
    assert_eq!(loaded.minimum_interval_between_samples_ms, 1000);
    assert_eq!(loaded.menu_task_count, 10);
}

#[test]
fn test_config_malformed_or_missing_file_falls_back() {
    let path = scratch_file("malformed.toml");
    std::fs::write(&path, "update_interval_ms = \"soon\"").unwrap();
    assert_eq!(AppConfig::load_from(&path).update_interval_ms, 2000);

    let missing = scratch_file("does-not-exist.toml");
    assert_eq!(AppConfig::load_from(&missing).theme, "Dark");
}

#[test]
fn test_config_path_location() {
    let path = AppConfig::config_path();
    assert!(path.ends_with("task-monitor/config.toml"));
}

#[test]
fn test_config_serialization() {
    let config = AppConfig::default();
    let serialized = toml::to_string(&config).unwrap();
    let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
    assert_eq!(deserialized.update_interval_ms, config.update_interval_ms);
    assert_eq!(deserialized.all_mem_color, config.all_mem_color);
}
