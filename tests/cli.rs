use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn demo_runs_a_batch_to_completion() {
    Command::cargo_bin("workpool-demo")
        .unwrap()
        .args([
            "--core",
            "2",
            "--max",
            "4",
            "--keep-alive-ms",
            "100",
            "--queue-capacity",
            "4",
            "--min-spare",
            "1",
            "--tasks",
            "8",
            "--task-ms",
            "10",
        ])
        .assert()
        .success()
        .stderr(contains("all tasks completed (8 of 8"));
}

#[test]
fn demo_rejects_invalid_sizing() {
    Command::cargo_bin("workpool-demo")
        .unwrap()
        .args(["--core", "0", "--tasks", "1", "--task-ms", "1"])
        .assert()
        .failure()
        .stderr(contains("invalid configuration"));
}
