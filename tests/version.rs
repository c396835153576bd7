use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_matches_package() {
    let ver = env!("CARGO_PKG_VERSION");
    assert!(ver.split('.').count() >= 2);

    Command::cargo_bin("pcd2bin")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(ver));
}
