use std::fs::write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

/// Help output lists the deploy subcommand and its override flags.
#[test]
fn help_lists_recognized_options() {
    let mut cmd = Command::cargo_bin("site-deploy").expect("Binary exists");
    cmd.arg("deploy").arg("--help");
    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("--config")
                .and(predicate::str::contains("--bucket"))
                .and(predicate::str::contains("--local-dir")),
        );
}

/// A missing config file fails before any remote call, with exit code 1.
#[test]
fn missing_config_file_exits_nonzero() {
    let mut cmd = Command::cargo_bin("site-deploy").expect("Binary exists");
    cmd.arg("deploy").arg("--config").arg("/no/such/config.yaml");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("read config file"));
}

/// An unparseable config file fails with a parse error, exit code 1.
#[test]
fn invalid_config_file_exits_nonzero() {
    let config = NamedTempFile::new().expect("temp config");
    write(config.path(), b"local_dir: [:::").expect("write temp config");

    let mut cmd = Command::cargo_bin("site-deploy").expect("Binary exists");
    cmd.arg("deploy").arg("--config").arg(config.path());
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("parse"));
}

/// Config validation rejects bad values before any remote call.
#[test]
fn invalid_concurrency_exits_nonzero() {
    let config = NamedTempFile::new().expect("temp config");
    write(
        config.path(),
        b"local_dir: ./public\ns3:\n  bucket: mybucket\n  region: us-east-1\n  concurrency: 0\n",
    )
    .expect("write temp config");

    let mut cmd = Command::cargo_bin("site-deploy").expect("Binary exists");
    cmd.arg("deploy").arg("--config").arg(config.path());
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("concurrency"));
}
