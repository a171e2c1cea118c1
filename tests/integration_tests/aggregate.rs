use super::{stderr, stdout, tracelat};

#[test]
fn test_aggregate_persisted_runs() {
    let home = tempfile::tempdir().unwrap();
    let runs = tempfile::tempdir().unwrap();
    let first = runs.path().join("1.json");
    let second = runs.path().join("2.json");
    std::fs::write(&first, r#"{"SUCCESS":[1000,3000],"FAILURE":[]}"#).unwrap();
    // 60000001 is the stored form of an unmeasurable request
    std::fs::write(&second, r#"{"SUCCESS":[],"FAILURE":[60000001]}"#).unwrap();

    let output = tracelat(
        home.path(),
        &[
            "aggregate",
            "--protocol",
            "Kafka async",
            first.to_str().unwrap(),
            second.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("Global Information for Total Kafka async"));
    assert!(stdout.contains("> Unit of measurement: ms"));
    assert!(stdout.contains("> Request count: 3 (OK=2 KO=1)"));
    assert!(stdout.contains("> Mean response time: 2.00 (OK=2.00 KO=-)"));
    assert!(stdout.contains("> Mean requests/sec: 0.0022"));
}

#[test]
fn test_aggregate_skips_bad_files() {
    let home = tempfile::tempdir().unwrap();
    let runs = tempfile::tempdir().unwrap();
    let good = runs.path().join("1.json");
    let bad = runs.path().join("2.json");
    std::fs::write(&good, r#"{"SUCCESS":[500],"FAILURE":[]}"#).unwrap();
    std::fs::write(&bad, "not json").unwrap();

    let output = tracelat(
        home.path(),
        &[
            "aggregate",
            "--protocol",
            "grpc",
            "--label",
            "grpc runs",
            good.to_str().unwrap(),
            bad.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("is not a run bucket file"));
    let stdout = stdout(&output);
    assert!(stdout.contains("Global Information for grpc runs"));
    assert!(stdout.contains("> Unit of measurement: μs"));
    assert!(stdout.contains("> Request count: 1 (OK=1 KO=0)"));
}

#[test]
fn test_aggregate_sync_failure_keeps_its_duration() {
    let home = tempfile::tempdir().unwrap();
    let runs = tempfile::tempdir().unwrap();
    let run = runs.path().join("1.json");
    // A thrift call that took ceiling + 1 microseconds
    std::fs::write(&run, r#"{"SUCCESS":[],"FAILURE":[60000001]}"#).unwrap();

    let output = tracelat(
        home.path(),
        &["aggregate", "--protocol", "thrift", run.to_str().unwrap()],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("Global Information for Total thrift"));
    assert!(stdout.contains("> Unit of measurement: s"));
    assert!(stdout.contains("> Max response time: 60.00 (OK=- KO=60.00)"));
}
