#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn mig() -> Command {
    let mut cmd = Command::cargo_bin("mig").unwrap();
    cmd.env_remove("MIG_CONFIG").env_remove("MIG_KEYRING");
    cmd
}

/// Generate a key named `name` and return (key path, keyring path).
fn keygen(dir: &TempDir, name: &str) -> (PathBuf, PathBuf) {
    let key = dir.path().join(format!("{name}.key"));
    let out = mig()
        .args(["keygen", "--name", name, "--out"])
        .arg(&key)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let keyring = dir.path().join("keyring.txt");
    let mut existing = std::fs::read_to_string(&keyring).unwrap_or_default();
    existing.push_str(&String::from_utf8(out).unwrap());
    std::fs::write(&keyring, existing).unwrap();
    (key, keyring)
}

fn new_action(dir: &TempDir, parameters: &str) -> PathBuf {
    let file = dir.path().join("action.json");
    mig()
        .args(["action", "new"])
        .arg(&file)
        .args([
            "--name",
            "terminate beacon",
            "--target",
            "hostname='web01'",
            "--module",
            "pidkill",
            "--parameters",
            parameters,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("created action"));
    file
}

fn sign(file: &Path, key: &Path) {
    mig()
        .args(["action", "sign"])
        .arg(file)
        .arg("--key")
        .arg(key)
        .assert()
        .success();
}

fn edit_action(file: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
    let mut value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(file).unwrap()).unwrap();
    edit(&mut value);
    std::fs::write(file, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

// ---------------------------------------------------------------------------
// mig id
// ---------------------------------------------------------------------------

#[test]
fn id_has_current_timestamp_in_high_word() {
    let out = mig().arg("id").assert().success().get_output().stdout.clone();
    let id: u64 = String::from_utf8(out).unwrap().trim().parse().unwrap();
    let ts = (id >> 32) as i64;
    let now = chrono::Utc::now().timestamp();
    assert!(ts <= now && ts > now - 60, "ts {ts}, now {now}");
}

#[test]
fn id_base32_parses_in_radix_32() {
    let out = mig()
        .args(["id", "--base32"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    let id = u64::from_str_radix(text.trim(), 32).unwrap();
    assert!((id >> 32) > 1_577_836_800);
}

// ---------------------------------------------------------------------------
// mig action
// ---------------------------------------------------------------------------

#[test]
fn unsigned_action_fails_validation() {
    let dir = TempDir::new().unwrap();
    let file = new_action(&dir, r#"{"proc_a":[4]}"#);
    mig()
        .args(["action", "validate"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("PGPSignature is empty"));
}

#[test]
fn sign_then_verify_succeeds() {
    let dir = TempDir::new().unwrap();
    let (key, keyring) = keygen(&dir, "alice");
    let file = new_action(&dir, r#"{"proc_a":[4]}"#);
    sign(&file, &key);

    mig()
        .args(["action", "validate"])
        .arg(&file)
        .assert()
        .success();
    mig()
        .args(["action", "verify"])
        .arg(&file)
        .arg("--keyring")
        .arg(&keyring)
        .assert()
        .success()
        .stdout(predicate::str::contains("signed by alice"));
}

#[test]
fn tampered_action_is_not_authentic() {
    let dir = TempDir::new().unwrap();
    let (key, keyring) = keygen(&dir, "alice");
    let file = new_action(&dir, r#"{"proc_a":[4]}"#);
    sign(&file, &key);
    edit_action(&file, |v| v["operations"][0]["parameters"]["proc_a"][0] = 5.into());

    mig()
        .args(["action", "verify"])
        .arg(&file)
        .arg("--keyring")
        .arg(&keyring)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid action signature"));
}

#[test]
fn expired_action_fails_validation() {
    let dir = TempDir::new().unwrap();
    let (key, _) = keygen(&dir, "alice");
    let file = new_action(&dir, "{}");
    edit_action(&file, |v| {
        v["validfrom"] = "2020-01-01T00:00:00Z".into();
        v["expireafter"] = "2020-01-02T00:00:00Z".into();
    });
    sign(&file, &key);

    mig()
        .args(["--json", "action", "validate"])
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"field\": \"expireafter\""))
        .stderr(predicate::str::contains("has expired"));
}

#[test]
fn new_rejects_out_of_range_hours() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("action.json");
    mig()
        .args(["action", "new"])
        .arg(&file)
        .args(["--name", "n", "--target", "t", "--module", "pidkill"])
        .args(["--hours", "9223372036854775807"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--hours 9223372036854775807 is out of range"));
    assert!(!file.exists());
}

#[test]
fn canonical_form_is_stable() {
    let dir = TempDir::new().unwrap();
    let file = new_action(&dir, r#"{"b":[3],"a":[2]}"#);
    let first = mig()
        .args(["action", "canonical"])
        .arg(&file)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let second = mig()
        .args(["action", "canonical"])
        .arg(&file)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(first, second);
    let text = String::from_utf8(first).unwrap();
    assert!(text.starts_with("name=terminate beacon; target=hostname='web01'; validfrom="));
    assert!(text.contains(r#"operations=[{"module":"pidkill","parameters":{"a":[2],"b":[3]}}];"#));
}

// ---------------------------------------------------------------------------
// mig module
// ---------------------------------------------------------------------------

#[test]
fn module_list_includes_pidkill() {
    mig()
        .args(["module", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pidkill"));
}

#[test]
fn module_run_rejects_out_of_range_pid() {
    mig()
        .args(["module", "run", "pidkill", r#"{"proc_a":[4,70000]}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("proc_a").and(predicate::str::contains("70000")));
}

#[test]
fn module_run_unknown_module() {
    mig()
        .args(["module", "run", "nosuch", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown module 'nosuch'"));
}

// ---------------------------------------------------------------------------
// mig exec
// ---------------------------------------------------------------------------

fn write_config(dir: &TempDir, keyring: &Path, modules: Option<&[&str]>) -> PathBuf {
    let path = dir.path().join("agent.yaml");
    let mut yaml = format!("keyring: {}\n", keyring.display());
    if let Some(modules) = modules {
        yaml.push_str(if modules.is_empty() { "modules: []\n" } else { "modules:\n" });
        for m in modules {
            yaml.push_str(&format!("  - {m}\n"));
        }
    }
    std::fs::write(&path, yaml).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn exec_kills_target_process() {
    use std::os::unix::process::ExitStatusExt;

    let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    let pid = child.id();
    if pid > 65535 {
        child.kill().unwrap();
        child.wait().unwrap();
        return;
    }

    let dir = TempDir::new().unwrap();
    let (key, keyring) = keygen(&dir, "alice");
    let file = new_action(&dir, &format!(r#"{{"proc_a":[{pid}]}}"#));
    sign(&file, &key);
    let config = write_config(&dir, &keyring, None);

    let out = mig()
        .args(["--json", "exec"])
        .arg(&file)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let reports: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(reports[0]["module"], "pidkill");
    assert_eq!(reports[0]["success"], true);
    assert_eq!(reports[0]["results"]["proc_a"][pid.to_string()], "killed");

    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(9));
}

#[test]
fn exec_refuses_unsigned_action() {
    let dir = TempDir::new().unwrap();
    let (_, keyring) = keygen(&dir, "alice");
    let file = new_action(&dir, r#"{"proc_a":[4]}"#);
    let config = write_config(&dir, &keyring, None);

    mig()
        .arg("exec")
        .arg(&file)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("PGPSignature is empty"));
}

#[test]
fn exec_reports_disabled_module() {
    let dir = TempDir::new().unwrap();
    let (key, keyring) = keygen(&dir, "alice");
    let file = new_action(&dir, r#"{"proc_a":[4]}"#);
    sign(&file, &key);
    let config = write_config(&dir, &keyring, Some(&["filechecker"]));

    mig()
        .arg("exec")
        .arg(&file)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("not enabled on this node"))
        .stderr(predicate::str::contains("one or more operations failed"));
}

#[test]
fn exec_json_reports_failure_exit_status() {
    let dir = TempDir::new().unwrap();
    let (key, keyring) = keygen(&dir, "alice");
    let file = new_action(&dir, r#"{"proc_a":[4]}"#);
    sign(&file, &key);
    let config = write_config(&dir, &keyring, Some(&["filechecker"]));

    let out = mig()
        .args(["--json", "exec"])
        .arg(&file)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("one or more operations failed"))
        .get_output()
        .stdout
        .clone();
    let reports: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(reports[0]["success"], false);
}

#[test]
fn exec_refuses_config_with_errors() {
    let dir = TempDir::new().unwrap();
    let (key, keyring) = keygen(&dir, "alice");
    let file = new_action(&dir, r#"{"proc_a":[4]}"#);
    sign(&file, &key);
    let config = write_config(&dir, &keyring, None);
    let mut yaml = std::fs::read_to_string(&config).unwrap();
    yaml.push_str("max_syntax_version: 0\n");
    std::fs::write(&config, yaml).unwrap();

    mig()
        .arg("exec")
        .arg(&file)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid agent config"));
}

// ---------------------------------------------------------------------------
// mig config
// ---------------------------------------------------------------------------

#[test]
fn config_validate_clean() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &dir.path().join("keyring.txt"), Some(&["pidkill"]));
    mig()
        .args(["config", "validate", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("config is valid"));
}

#[test]
fn config_validate_prints_warnings_and_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("agent.yaml");
    std::fs::write(
        &config,
        "keyring: keys.txt\nmax_syntax_version: 0\nmodules:\n  - pidkill\n  - pidkill\n",
    )
    .unwrap();

    mig()
        .args(["config", "validate", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(
            predicate::str::contains("[error] max_syntax_version is 0")
                .and(predicate::str::contains("[warning] module 'pidkill' is listed more than once")),
        )
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn config_validate_json_lists_warnings() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &dir.path().join("keyring.txt"), Some(&[]));
    let out = mig()
        .args(["--json", "config", "validate", "--config"])
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["warnings"][0]["level"], "warning");
}
