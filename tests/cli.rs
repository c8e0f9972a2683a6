mod common;

use assert_cmd::Command;
use common::write_file;
use predicates::prelude::*;
use tempfile::TempDir;

fn habitat_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("habitat").unwrap();
    cmd.env("HABITAT_HOME", home.path());
    cmd
}

#[test]
fn test_list_shows_registry() {
    let home = TempDir::new().unwrap();
    habitat_cmd(&home)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("is_elf"))
        .stdout(predicate::str::contains("gui_plotting_available"));
}

#[test]
fn test_check_exit_codes() {
    let home = TempDir::new().unwrap();
    let elf = write_file(&home.path().join("tool"), b"\x7fELF\x02\x01\x01");

    habitat_cmd(&home)
        .args(["check", "is_elf", "--path"])
        .arg(&elf)
        .assert()
        .code(0)
        .stdout("true\n");

    habitat_cmd(&home)
        .args(["check", "is_pe", "--path"])
        .arg(&elf)
        .assert()
        .code(1)
        .stdout("false\n");
}

#[test]
fn test_unknown_check_exits_2() {
    let home = TempDir::new().unwrap();
    habitat_cmd(&home)
        .args(["check", "on_plan9"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("on_plan9"));
}

#[test]
fn test_classify_missing_path() {
    let home = TempDir::new().unwrap();
    habitat_cmd(&home)
        .args(["classify"])
        .arg(home.path().join("absent"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Path not found"));
}

#[test]
fn test_classify_directory_is_not_a_file() {
    let home = TempDir::new().unwrap();
    habitat_cmd(&home)
        .arg("classify")
        .arg(home.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not a regular file"))
        .stderr(predicate::str::contains("Path not found").not());
}

#[test]
fn test_bare_name_on_path_resolves_installed_binary() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let binary = assert_cmd::cargo::cargo_bin("habitat");
    let bin_dir = binary.parent().unwrap().to_path_buf();

    let mut dirs = vec![bin_dir];
    if let Some(path) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&path));
    }
    let path = std::env::join_paths(dirs).unwrap();

    // argv0 is the bare "habitat" and the working directory holds no such file
    let output = std::process::Command::new("habitat")
        .args(["check", "path_is_valid"])
        .current_dir(work.path())
        .env("PATH", &path)
        .env("HABITAT_HOME", home.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "true\n");
}

#[test]
fn test_classify_script() {
    let home = TempDir::new().unwrap();
    let script = write_file(&home.path().join("run.py"), b"print(1)\n");
    habitat_cmd(&home)
        .arg("classify")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("plain script"));
}

#[test]
fn test_report_json() {
    let home = TempDir::new().unwrap();
    let script = write_file(&home.path().join("run.py"), b"print(1)\n");
    let output = habitat_cmd(&home)
        .args(["report", "--json", "--path"])
        .arg(&script)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["inspection"]["format"], "plain_script");
    assert_eq!(report["categories"].as_array().unwrap().len(), 4);
}

#[test]
fn test_invalid_config_exits_2() {
    let home = TempDir::new().unwrap();
    write_file(
        &home.path().join("config.toml"),
        b"[classify]\nzip_bundle_suffix = \"py\"\nscript_suffix = \"py\"\n",
    );
    habitat_cmd(&home).arg("list").assert().code(2);
}
