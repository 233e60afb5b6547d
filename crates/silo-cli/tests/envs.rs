mod common;

use common::{json_stdout, silo_cmd};

#[test]
fn duplicate_environment_names_exit_with_1() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");

    silo_cmd(&home)
        .args(["create-env", "web_app", "--description", "Web application"])
        .assert()
        .success();

    let assert = silo_cmd(&home)
        .args(["--json", "create-env", "web_app"])
        .assert()
        .code(1);
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["status"], "user-error");
    assert_eq!(envelope["details"]["code"], "SL320");
}

#[test]
fn pinning_into_an_unknown_environment_exits_with_1() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");

    let assert = silo_cmd(&home)
        .args(["--json", "pin", "missing", "calculator", "1.0.0"])
        .assert()
        .code(1);
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["code"], "SL321");
}

#[test]
fn repinning_replaces_the_previous_version() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");

    silo_cmd(&home)
        .args(["create-env", "api_service"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["pin", "api_service", "calculator", "1.0.0"])
        .assert()
        .success();

    let assert = silo_cmd(&home)
        .args(["--json", "pin", "api_service", "calculator", "2.0.0"])
        .assert()
        .success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["outcome"], "replaced");
    assert_eq!(envelope["details"]["previous"], "1.0.0");

    let assert = silo_cmd(&home)
        .args(["--json", "show-env", "api_service"])
        .assert()
        .success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["package_count"], 1);
    assert_eq!(envelope["details"]["selections"]["calculator"], "2.0.0");
}

#[test]
fn list_envs_reports_counts_and_descriptions() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");

    silo_cmd(&home)
        .args(["create-env", "web_app", "--description", "Web application"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["create-env", "data_pipeline", "--description", "ETL"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["pin", "web_app", "formatter", "1.5.0"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["pin", "web_app", "validator", "3.2.1"])
        .assert()
        .success();

    let assert = silo_cmd(&home)
        .args(["--json", "list-envs"])
        .assert()
        .success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["count"], 2);
    let environments = envelope["details"]["environments"]
        .as_array()
        .expect("environments");
    assert_eq!(environments[0]["name"], "data_pipeline");
    assert_eq!(environments[0]["package_count"], 0);
    assert_eq!(environments[1]["name"], "web_app");
    assert_eq!(environments[1]["package_count"], 2);
    assert_eq!(environments[1]["description"], "Web application");
}

#[test]
fn show_env_on_an_unknown_name_exits_with_1() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");

    let assert = silo_cmd(&home)
        .args(["--json", "show-env", "nope"])
        .assert()
        .code(1);
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["code"], "SL321");
}

#[test]
fn environments_persist_across_invocations() {
    let temp = tempfile::tempdir().expect("tempdir");
    let home = temp.path().join("home");

    silo_cmd(&home)
        .args(["create-env", "data_pipeline", "--description", "ETL"])
        .assert()
        .success();
    silo_cmd(&home)
        .args(["pin", "data_pipeline", "utils", "0.9.0"])
        .assert()
        .success();

    let assert = silo_cmd(&home)
        .args(["--json", "show-env", "data_pipeline"])
        .assert()
        .success();
    let envelope = json_stdout(&assert);
    assert_eq!(envelope["details"]["description"], "ETL");
    assert_eq!(envelope["details"]["selections"]["utils"], "0.9.0");
}
