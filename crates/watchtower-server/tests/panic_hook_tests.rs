use watchtower_config::MonitorConfig;
use watchtower_logging::{EventLog, LogStream};
use watchtower_server::AppState;
use watchtower_shutdown::ShutdownSignal;

/// panic 同步写入 errors.log 并触发 Fatal 关闭
#[tokio::test]
async fn test_panic_records_fatal_error_and_triggers_shutdown() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = MonitorConfig::default();
    config.systems.clear();
    config.paths.archive_dir = temp_dir.path().join("archive");
    config.paths.dashboard_dir = temp_dir.path().join("dashboard");
    config.paths.reports_dir = temp_dir.path().join("reports");
    config.logging.directory = temp_dir.path().join("logs");

    let state = AppState::new(config).unwrap();
    state.install_panic_hook();

    let result = tokio::spawn(async {
        panic!("collector thread exploded");
    })
    .await;
    assert!(result.unwrap_err().is_panic());

    assert_eq!(state.signals.triggered_signal(), Some(ShutdownSignal::Fatal));

    let errors = EventLog::new(temp_dir.path().join("logs"))
        .read_stream(LogStream::Errors)
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["event"], "fatal_error");
    assert!(errors[0]["error"]
        .as_str()
        .unwrap()
        .contains("collector thread exploded"));
}
