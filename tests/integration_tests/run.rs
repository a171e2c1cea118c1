use std::path::Path;

use super::{stderr, stdout, testdata, tracelat};

fn stage_run(base: &Path, protocol: &str, experiment: &str, run: u32, fixture: &str) {
    let dir = base.join(protocol).join(experiment).join(run.to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::copy(testdata(fixture), dir.join("traces.json")).unwrap();
}

#[test]
fn test_run_reports_and_persists_each_run() {
    let home = tempfile::tempdir().unwrap();
    let base = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    stage_run(base.path(), "RabbitMQ async", "500u10p", 1, "rabbitmq_async.json");
    stage_run(base.path(), "RabbitMQ async", "500u10p", 2, "rabbitmq_async.json");

    let output = tracelat(
        home.path(),
        &[
            "run",
            "--base-dir",
            base.path().to_str().unwrap(),
            "--experiment",
            "500u10p",
            "--protocol",
            "RabbitMQ async",
            "--runs",
            "3",
            "--output-dir",
            results.path().to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.starts_with("Processing protocol: RabbitMQ async\n"));
    assert!(stdout.contains("Global Information for RabbitMQ async Run 1"));
    assert!(stdout.contains("Global Information for RabbitMQ async Run 2"));
    assert!(!stdout.contains("RabbitMQ async Run 3"));
    assert!(stdout.contains("Global Information for Total RabbitMQ async"));
    assert!(stdout.contains("> Request count: 4 (OK=2 KO=2)"));
    // Run 3 was never staged
    assert!(stderr(&output).contains("skipping run"));

    let persisted = results.path().join("RabbitMQ async").join("500u10p");
    for run in ["1.json", "2.json"] {
        assert_eq!(
            std::fs::read_to_string(persisted.join(run)).unwrap(),
            r#"{"SUCCESS":[1500],"FAILURE":[60000001]}"#
        );
    }
    assert!(!persisted.join("3.json").exists());
}

#[test]
fn test_run_protocols_from_config() {
    let home = tempfile::tempdir().unwrap();
    let base = tempfile::tempdir().unwrap();
    let results = tempfile::tempdir().unwrap();
    std::fs::write(
        home.path().join("config.toml"),
        format!(
            "runs = 1\nprotocols = [\"rest\"]\noutput-dir = {:?}\n",
            results.path().to_str().unwrap()
        ),
    )
    .unwrap();
    stage_run(base.path(), "rest", "100u10p", 1, "rest.json");

    let output = tracelat(
        home.path(),
        &[
            "run",
            "--base-dir",
            base.path().to_str().unwrap(),
            "--experiment",
            "100u10p",
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("Processing protocol: rest"));
    assert!(!stdout.contains("Processing protocol: grpc"));
    assert!(stdout.contains("Global Information for Total rest"));
    assert_eq!(
        std::fs::read_to_string(results.path().join("rest/100u10p/1.json")).unwrap(),
        r#"{"SUCCESS":[7655],"FAILURE":[12345]}"#
    );
}
