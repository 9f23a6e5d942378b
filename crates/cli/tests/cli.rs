use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn setup() -> TempDir {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(src.join(".git")).unwrap();
    fs::write(
        src.join("lib.rs"),
        "pub fn greeting() -> String {\n    format!(\"hello {}\", \"world\")\n}\n",
    )
    .unwrap();
    fs::write(src.join("README.md"), "Greeting library. Call greeting().").unwrap();
    fs::write(src.join(".git").join("HEAD"), "greeting inside git").unwrap();

    let config = format!(
        "[[indexes]]\nname = \"demo\"\nmonitor_folder = {:?}\nindex_folder = {:?}\n",
        src.display().to_string(),
        temp.path().join("index").display().to_string(),
    );
    fs::write(temp.path().join("codesearch.toml"), config).unwrap();
    temp
}

#[allow(deprecated)]
fn codesearch(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("codesearch").expect("binary");
    cmd.current_dir(dir)
        .env_remove("CODESEARCH_CONFIG")
        .arg("--quiet");
    cmd
}

fn json(dir: &Path, args: &[&str]) -> Value {
    let output = codesearch(dir).args(args).output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn file_names(body: &Value) -> Vec<String> {
    let mut names: Vec<String> = body["result"]
        .as_array()
        .expect("result array")
        .iter()
        .map(|hit| hit["file_name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn index_then_search_and_hints() {
    let temp = setup();
    let reports = json(temp.path(), &["index"]);
    assert_eq!(reports[0]["name"], "demo");
    assert_eq!(reports[0]["health"]["initial_files_indexed"], 2);

    let hits = json(temp.path(), &["search", "demo", "greeting"]);
    assert_eq!(hits["status"]["success"], true);
    assert_eq!(file_names(&hits), vec!["README.md", "lib.rs"]);

    let scoped = json(temp.path(), &["search", "demo", "greeting", "--ext", "rs"]);
    assert_eq!(file_names(&scoped), vec!["lib.rs"]);

    let phrase = json(temp.path(), &["search", "demo", "--phrase", "Call greeting()"]);
    assert_eq!(file_names(&phrase), vec!["README.md"]);

    let hints = json(temp.path(), &["hints", "demo", "GREE"]);
    assert_eq!(hints["result"], serde_json::json!(["Greeting", "greeting"]));

    let status = json(temp.path(), &["status"]);
    assert_eq!(status[0]["documents"], 2);
}

#[test]
fn failures_exit_non_zero_with_a_json_status() {
    let temp = setup();
    json(temp.path(), &["index"]);

    codesearch(temp.path())
        .args(["search", "demo", "*eeting"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"success\":false"))
        .stdout(predicate::str::contains("Not supported"));

    codesearch(temp.path())
        .args(["search", "missing", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No index named missing"));
}

#[test]
#[allow(deprecated)]
fn config_path_comes_from_the_environment() {
    let temp = setup();
    let elsewhere = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("codesearch").expect("binary");
    cmd.current_dir(elsewhere.path())
        .env("CODESEARCH_CONFIG", temp.path().join("codesearch.toml"))
        .args(["--quiet", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\":\"demo\""));
}
