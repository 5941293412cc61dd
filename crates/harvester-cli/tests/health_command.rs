use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_harvester_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("harvester")
}

#[test]
fn test_health_unreachable_receiver_fails() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut cmd = Command::new(get_harvester_bin());
    cmd.arg("health")
        .arg("--receiver")
        .arg(format!("http://127.0.0.1:{}", port));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not reachable"));
}

#[test]
fn test_health_rejects_https_receiver() {
    let mut cmd = Command::new(get_harvester_bin());
    cmd.arg("health").arg("--receiver").arg("https://127.0.0.1:5055");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid receiver URL"));
}

#[test]
fn test_health_uses_env_receiver() {
    let mut cmd = Command::new(get_harvester_bin());
    cmd.env("HARVESTER_RECEIVER_URL", "not a url").arg("health");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid receiver URL"));
}
