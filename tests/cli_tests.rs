use assert_cmd::Command;
use tempfile::TempDir;

fn roost(store: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("roost").unwrap();
    cmd.env("ROOST_PATH", store.path().join("store"));
    cmd
}

#[test]
fn test_init_creates_manifest() {
    let dir = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    roost(&store)
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
    let manifest = dir.path().join("roost.yaml");
    assert!(manifest.exists());
    let content = std::fs::read_to_string(&manifest).unwrap();
    assert!(content.contains("targets"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    std::fs::write(dir.path().join("roost.yaml"), "targets: []\n").unwrap();
    roost(&store)
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicates::str::contains("already exists"));
}

#[test]
fn test_list_empty_store() {
    let store = TempDir::new().unwrap();
    roost(&store)
        .arg("list")
        .assert()
        .success()
        .stdout(predicates::str::contains("No commands installed"));
}

#[test]
fn test_uninstall_absent_command() {
    let store = TempDir::new().unwrap();
    roost(&store)
        .args(["uninstall", "missing"])
        .assert()
        .success()
        .stdout(predicates::str::contains("not installed"));
}

#[test]
fn test_switch_unknown_version_fails() {
    let store = TempDir::new().unwrap();
    roost(&store)
        .args(["switch", "foo", "9.9.9"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("not installed"));
}

#[test]
fn test_install_rejects_bad_reference() {
    let store = TempDir::new().unwrap();
    roost(&store)
        .args(["install", "not a reference"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid repository reference"));
}

#[test]
fn test_bootstrap_missing_manifest_fails() {
    let dir = TempDir::new().unwrap();
    let store = TempDir::new().unwrap();
    roost(&store)
        .current_dir(dir.path())
        .arg("bootstrap")
        .assert()
        .failure();
}
