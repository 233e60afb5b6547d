mod common;

use common::{json_stdout, silo_cmd, write_payload};

#[test]
fn add_is_idempotent_across_invocations() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");
    let payload = write_payload(temp.path(), "calc", &[("__init__.py", "VERSION = '1.0.0'\n")]);

    silo_cmd(&home)
        .args(["add", "calculator", "1.0.0"])
        .arg(&payload)
        .assert()
        .success();

    let assert = silo_cmd(&home)
        .args(["--json", "add", "calculator", "1.0.0"])
        .arg(&payload)
        .assert()
        .success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["status"], "ok");
    assert_eq!(envelope["details"]["already_stored"], true);

    let assert = silo_cmd(&home).args(["--json", "info"]).assert().success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["total_versions"], 1);
    assert_eq!(envelope["details"]["unique_packages"], 1);
}

#[test]
fn list_orders_versions_by_name_then_version() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");
    let v1 = write_payload(temp.path(), "calc-1", &[("lib.py", "one")]);
    let v2 = write_payload(temp.path(), "calc-2", &[("lib.py", "two")]);
    let utils = write_payload(temp.path(), "utils", &[("util.py", "pass")]);

    silo_cmd(&home)
        .args(["add", "utils", "0.9.0"])
        .arg(&utils)
        .assert()
        .success();
    silo_cmd(&home)
        .args(["add", "calculator", "2.0.0"])
        .arg(&v2)
        .assert()
        .success();
    silo_cmd(&home)
        .args(["add", "calculator", "1.0.0"])
        .arg(&v1)
        .assert()
        .success();

    let assert = silo_cmd(&home).args(["--json", "list"]).assert().success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["count"], 3);
    let packages = envelope["details"]["packages"].as_array().expect("packages");
    let keys: Vec<(String, String)> = packages
        .iter()
        .map(|pkg| {
            (
                pkg["name"].as_str().unwrap().to_string(),
                pkg["version"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        keys,
        vec![
            ("calculator".to_string(), "1.0.0".to_string()),
            ("calculator".to_string(), "2.0.0".to_string()),
            ("utils".to_string(), "0.9.0".to_string()),
        ]
    );
}

#[test]
fn adding_from_a_missing_source_exits_with_1() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");

    silo_cmd(&home)
        .args(["add", "ghost", "1.0.0"])
        .arg(temp.path().join("does-not-exist"))
        .assert()
        .code(1);

    let assert = silo_cmd(&home).args(["--json", "info"]).assert().success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["total_versions"], 0);
}

#[test]
fn malformed_identifiers_exit_with_1() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");
    let payload = write_payload(temp.path(), "p", &[("a.py", "a")]);

    let assert = silo_cmd(&home)
        .args(["--json", "add", "bad/name", "1.0.0"])
        .arg(&payload)
        .assert()
        .code(1);
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["status"], "user-error");
    assert_eq!(envelope["details"]["code"], "SL301");
}

#[test]
fn doctor_reports_a_clean_store() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");
    let payload = write_payload(temp.path(), "v", &[("v.py", "ok")]);

    silo_cmd(&home)
        .args(["add", "validator", "3.2.1"])
        .arg(&payload)
        .assert()
        .success();

    let assert = silo_cmd(&home).args(["--json", "doctor"]).assert().success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["status"], "ok");
    assert_eq!(envelope["details"]["corrupt_payloads"], 0);
}
