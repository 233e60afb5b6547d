#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;

/// Build a `silo` invocation isolated under its own data root.
pub fn silo_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("silo");
    cmd.env("SILO_HOME", home);
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Write a small payload tree and return its path.
pub fn write_payload(root: &Path, rel: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = root.join(rel);
    for (name, contents) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create payload dirs");
        }
        fs::write(path, contents).expect("write payload file");
    }
    dir
}

/// Parse the `--json` envelope printed on stdout.
pub fn json_stdout(assert: &assert_cmd::assert::Assert) -> serde_json::Value {
    let output = assert.get_output();
    serde_json::from_slice(&output.stdout).expect("stdout is a JSON envelope")
}
