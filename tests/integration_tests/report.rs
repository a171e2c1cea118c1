use insta::assert_snapshot;

use super::{stderr, stdout, testdata, tracelat};

#[test]
fn test_report_async_end_to_end() {
    let home = tempfile::tempdir().unwrap();
    let batch = testdata("rabbitmq_async.json");

    let output = tracelat(
        home.path(),
        &["report", "--protocol", "RabbitMQ async", batch.to_str().unwrap()],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    // One trace round-trips in 1500μs, one never gets its reply, one is a
    // lone health check and is skipped.
    assert_snapshot!(stdout(&output), @r"
    ---- Global Information for RabbitMQ async --------------------------------------------------------
    > Unit of measurement: ms
    > Request count: 2 (OK=1 KO=1)
    > Min response time: 1.50 (OK=1.50 KO=-)
    > Max response time: 1.50 (OK=1.50 KO=-)
    > Mean response time: 1.50 (OK=1.50 KO=-)
    > Std deviation: 0.00 (OK=0.00 KO=-)
    > Response time 50th percentile: 1.50 (OK=1.50 KO=-)
    > Response time 75th percentile: 1.50 (OK=1.50 KO=-)
    > Response time 95th percentile: 1.50 (OK=1.50 KO=-)
    > Response time 99th percentile: 1.50 (OK=1.50 KO=-)
    > Mean requests/sec: 0.0011
    ");
}

#[test]
fn test_report_rest_outcome_tag() {
    let home = tempfile::tempdir().unwrap();
    let batch = testdata("rest.json");

    let output = tracelat(
        home.path(),
        &["report", "--protocol", "rest", batch.to_str().unwrap()],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("Global Information for rest"));
    assert!(stdout.contains("> Unit of measurement: ms"));
    assert!(stdout.contains("> Request count: 2 (OK=1 KO=1)"));
    assert!(stdout.contains("> Mean response time: 10.00 (OK="));
}

#[test]
fn test_report_window_from_config() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(home.path().join("config.toml"), "window-secs = 1\n").unwrap();
    let batch = testdata("rest.json");

    let output = tracelat(
        home.path(),
        &["report", "--protocol", "rest", batch.to_str().unwrap()],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("> Mean requests/sec: 1.0000"));
}

#[test]
fn test_report_skips_unreadable_files() {
    let home = tempfile::tempdir().unwrap();
    let missing = home.path().join("missing.json");
    let batch = testdata("rest.json");

    let output = tracelat(
        home.path(),
        &[
            "report",
            "--protocol",
            "rest",
            missing.to_str().unwrap(),
            batch.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("missing.json"));
    assert!(stdout(&output).contains("> Request count: 2 (OK=1 KO=1)"));
}

#[test]
fn test_report_fails_when_nothing_loads() {
    let home = tempfile::tempdir().unwrap();
    let no_data = home.path().join("no-data.json");
    std::fs::write(&no_data, r#"{"errors": null}"#).unwrap();

    let output = tracelat(
        home.path(),
        &["report", "--protocol", "grpc", no_data.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("none of the 1 batch files could be read"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_unknown_protocol_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let batch = testdata("rest.json");

    let output = tracelat(
        home.path(),
        &["report", "--protocol", "soap", batch.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("soap"));
}

#[test]
fn test_explicit_config_must_exist() {
    let home = tempfile::tempdir().unwrap();
    let missing = home.path().join("elsewhere.toml");
    let batch = testdata("rest.json");

    let output = tracelat(
        home.path(),
        &[
            "--config",
            missing.to_str().unwrap(),
            "report",
            "--protocol",
            "rest",
            batch.to_str().unwrap(),
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(stderr.contains("failed to load configuration"));
    assert!(stderr.contains("elsewhere.toml"));
}
