use std::fs;
use tempfile::tempdir;
use watch_config::{ConfigLoader, CONFIG_FILE_NAME};
use watch_metrics::AlertResult;
use watch_server::{ServerConfig, WatchApp};

const CONFIG: &str = r#"
[monitoring]
max_metrics = 4
max_alerts = 4

[retry]
max_attempts = 1

[[rules]]
metric_name = "cpu_usage"
threshold = 80.0
condition = "GreaterThan"
window_size = 3

[[rules]]
metric_name = "disk_space"
threshold = 20.0
condition = "LessThan"
window_size = 3

[metrics.cpu_usage]
min_value = 0.0
max_value = 100.0
"#;

fn load(dir: &std::path::Path) -> ServerConfig {
    fs::write(dir.join(CONFIG_FILE_NAME), CONFIG).unwrap();
    ServerConfig::load(&ConfigLoader::with_env_prefix(dir, "CHAIN_WATCH_RUN_TEST")).unwrap()
}

#[tokio::test]
async fn test_run_from_config_file() {
    let dir = tempdir().unwrap();
    let config = load(dir.path());
    let app = WatchApp::build(&config).await.unwrap();

    let input = "\
cpu_usage 70 2024-05-01T12:00:00Z
disk_space 50 2024-05-01T12:00:00Z

cpu_usage 85 2024-05-01T12:01:00Z
disk_space 15 2024-05-01T12:01:00Z
cpu_usage 120 2024-05-01T12:02:00Z
";
    let mut output = Vec::new();
    let summary = app.run(input.as_bytes(), &mut output).await.unwrap();

    let results: Vec<AlertResult> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    // 两个批次，每批两条规则
    assert_eq!(results.len(), 4);
    assert_eq!(
        results.iter().map(|r| r.triggered).collect::<Vec<_>>(),
        vec![false, false, true, true]
    );
    assert_eq!(results[2].value, 85.0);

    // 120 超出 cpu_usage 的取值范围
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.collected, 4);
    assert_eq!(summary.alerts_triggered, 2);
}

#[tokio::test]
async fn test_check_config_output_reloads() {
    let dir = tempdir().unwrap();
    let config = load(dir.path());

    let text = config.to_toml().unwrap();
    let reparsed: ServerConfig = toml::from_str(&text).unwrap();

    assert_eq!(reparsed, config);
    assert_eq!(reparsed.rules.len(), 2);
}
