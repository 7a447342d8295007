use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

#[test]
fn test_malformed_row_skipped() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, payment, amount, currency, arg").unwrap();
    writeln!(file, "teleport, p1, 100.00, USD, ").unwrap();
    writeln!(file, "authorize, p2, 10.00, USD, capture").unwrap();

    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg(file.path());

    // The bad row is reported, the rest of the feed still runs.
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading operation"))
        .stdout(predicate::str::contains("p2,completed,10.00,USD,0,"));
}

#[test]
fn test_operation_on_unknown_payment() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, payment, amount, currency, arg").unwrap();
    writeln!(file, "capture, ghost, , , ").unwrap();

    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("unknown payment: ghost"));
}

#[test]
fn test_authorize_requires_amount_and_currency() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, payment, amount, currency, arg").unwrap();
    writeln!(file, "authorize, p1, , , capture").unwrap();

    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("requires both amount and currency"))
        .stdout(predicate::str::contains("p1,").not());
}

#[test]
fn test_malformed_notify_argument() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, payment, amount, currency, arg").unwrap();
    writeln!(file, "authorize, p1, 10.00, USD, capture").unwrap();
    writeln!(file, "notify, p1, , , CAPTURE_ONLY_TWO_PARTS:true").unwrap();

    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error processing operation"))
        .stdout(predicate::str::contains("p1,completed,10.00,USD,0,"));
}

#[test]
fn test_negative_authorization_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, payment, amount, currency, arg").unwrap();
    writeln!(file, "authorize, p1, -100.00, USD, capture").unwrap();

    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("must be positive"))
        .stdout(predicate::str::contains("p1,").not());
}

#[test]
fn test_negative_amount_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, payment, amount, currency, arg").unwrap();
    writeln!(file, "authorize, p1, 100.00, USD, capture").unwrap();
    writeln!(file, "refund, p1, -5.00, USD, ").unwrap();

    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("must be positive"))
        .stdout(predicate::str::contains("p1,completed,100.00,USD,0,"));
}

#[test]
fn test_missing_input_file_fails() {
    let mut cmd = Command::new(cargo_bin!("payflow"));
    cmd.arg("does-not-exist.csv");
    cmd.assert().failure();
}
