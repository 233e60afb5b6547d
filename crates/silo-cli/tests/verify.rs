mod common;

use common::{json_stdout, silo_cmd, write_payload};

#[test]
fn verification_tells_complete_and_incomplete_environments_apart() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");
    let v1 = write_payload(temp.path(), "calc-1", &[("__init__.py", "VERSION = '1.0.0'\n")]);
    let v2 = write_payload(temp.path(), "calc-2", &[("__init__.py", "VERSION = '2.0.0'\n")]);

    silo_cmd(&home)
        .args(["add", "calculator", "1.0.0"])
        .arg(&v1)
        .assert()
        .success();
    silo_cmd(&home)
        .args(["add", "calculator", "2.0.0"])
        .arg(&v2)
        .assert()
        .success();

    let assert = silo_cmd(&home).args(["--json", "info"]).assert().success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["unique_packages"], 1);
    assert_eq!(envelope["details"]["total_versions"], 2);

    silo_cmd(&home)
        .args(["create-env", "web_app", "--description", "Web application"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["pin", "web_app", "calculator", "2.0.0"])
        .assert()
        .success();

    let assert = silo_cmd(&home)
        .args(["--json", "verify", "web_app"])
        .assert()
        .success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["status"], "ok");
    assert_eq!(envelope["details"]["status"], "complete");
    assert_eq!(envelope["details"]["total_packages"], 1);

    silo_cmd(&home)
        .args(["create-env", "api_service", "--description", "REST API"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["pin", "api_service", "calculator", "1.0.0"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["pin", "api_service", "utils", "0.9.0"])
        .assert()
        .success();

    let assert = silo_cmd(&home)
        .args(["--json", "verify", "api_service"])
        .assert()
        .code(1);
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["status"], "user-error");
    assert_eq!(envelope["details"]["status"], "incomplete");
    assert_eq!(envelope["details"]["total_packages"], 2);
    let missing = envelope["details"]["missing"].as_array().expect("missing");
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0]["name"], "utils");
    assert_eq!(missing[0]["version"], "0.9.0");
}

#[test]
fn verifying_an_unknown_environment_exits_with_1() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");

    let assert = silo_cmd(&home)
        .args(["--json", "verify", "nope"])
        .assert()
        .code(1);
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["code"], "SL321");
}

#[test]
fn resolve_is_all_or_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");
    let payload = write_payload(temp.path(), "fmt", &[("fmt.py", "fmt")]);

    silo_cmd(&home)
        .args(["add", "formatter", "1.5.0"])
        .arg(&payload)
        .assert()
        .success();
    silo_cmd(&home)
        .args(["create-env", "data_pipeline"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["pin", "data_pipeline", "formatter", "1.5.0"])
        .assert()
        .success();

    let assert = silo_cmd(&home)
        .args(["--json", "resolve", "data_pipeline"])
        .assert()
        .success();
    let envelope = json_stdout(&assert);
    let resolved = envelope["details"]["paths"]["formatter"]
        .as_str()
        .expect("resolved path");
    assert!(std::path::Path::new(resolved).join("fmt.py").exists());

    silo_cmd(&home)
        .args(["pin", "data_pipeline", "utils", "0.9.0"])
        .assert()
        .success();
    let assert = silo_cmd(&home)
        .args(["--json", "resolve", "data_pipeline"])
        .assert()
        .code(1);
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["code"], "SL330");
    assert_eq!(envelope["details"]["missing"][0]["name"], "utils");
}

#[test]
fn gc_reclaims_only_unreferenced_versions() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");
    let v1 = write_payload(temp.path(), "c1", &[("lib.py", "one")]);
    let v2 = write_payload(temp.path(), "c2", &[("lib.py", "two")]);

    silo_cmd(&home)
        .args(["add", "calculator", "1.0.0"])
        .arg(&v1)
        .assert()
        .success();
    silo_cmd(&home)
        .args(["add", "calculator", "2.0.0"])
        .arg(&v2)
        .assert()
        .success();
    silo_cmd(&home)
        .args(["create-env", "web_app"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["pin", "web_app", "calculator", "2.0.0"])
        .assert()
        .success();

    let assert = silo_cmd(&home).args(["--json", "gc"]).assert().success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["scanned"], 2);
    assert_eq!(envelope["details"]["reclaimed"], 1);

    let assert = silo_cmd(&home)
        .args(["--json", "verify", "web_app"])
        .assert()
        .success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["status"], "complete");

    let assert = silo_cmd(&home).args(["--json", "list"]).assert().success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["count"], 1);
}
