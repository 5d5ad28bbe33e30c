use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

const DATASET: &str = r#"[
  {"canonical_name": "Hydroquinone", "regulation_id": "II/1339",
   "synonyms": ["1,4-benzenediol"], "cas_number": "123-31-9",
   "is_cmr": true, "cmr_note": "Reprotoxic Cat. 1B"},
  {"canonical_name": "Trichloroacetic acid", "regulation_id": "II/1180"},
  {"canonical_name": "Formaldehyde", "regulation_id": "II/1577",
   "synonyms": ["formalin"], "cas_number": "50-00-0", "is_cmr": true},
  {"canonical_name": "Glycerin", "regulation_id": "II/9999"}
]"#;

fn annexg_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("annexg");
    path
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("annex_ii.json"), DATASET).unwrap();

    let config_content = format!(
        r#"[dataset]
path = "{}/data/annex_ii.json"
version = "it-1"
{}
"#,
        root.display(),
        extra
    );

    let config_path = config_dir.join("annexg.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_annexg(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = annexg_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run annexg binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_analyze_safe_list() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, stderr, success) = run_annexg(&config_path, &["analyze", "Water, Shea butter"]);
    assert!(success, "analyze failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("overall:   SAFE"));
    assert!(stdout.contains("--- Ingredients (2) ---"));
}

#[test]
fn test_analyze_prohibited_with_cmr() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, _, success) = run_annexg(&config_path, &["analyze", "Aqua, Hydroquinone"]);
    assert!(success);
    assert!(stdout.contains("overall:   PROHIBITED"));
    assert!(stdout.contains("Hydroquinone (II/1339)"));
    assert!(stdout.contains("CMR: Reprotoxic Cat. 1B"));
}

#[test]
fn test_analyze_json_output() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, _, success) = run_annexg(
        &config_path,
        &["analyze", "Trichloroacetic acd, 50-00-0", "--json"],
    );
    assert!(success);
    let job: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(job["status"], "complete");
    assert_eq!(job["dataset_version"], "it-1");
    let summary = &job["result"];
    assert_eq!(summary["overall"], "prohibited");
    assert_eq!(summary["counts"]["warning"], 1);
    assert_eq!(summary["counts"]["prohibited"], 1);
    let items = summary["ingredients"].as_array().unwrap();
    assert_eq!(items[0]["status"], "warning");
    assert_eq!(items[0]["score"], 95.0);
    assert_eq!(items[1]["matched_name"], "Formaldehyde");
}

#[test]
fn test_locant_comma_keeps_synonym_whole() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, _, success) =
        run_annexg(&config_path, &["analyze", "1,4-Benzenediol, Aqua", "--json"]);
    assert!(success);
    let job: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let items = job["result"]["ingredients"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["status"], "prohibited");
    assert_eq!(items[0]["regulation_id"], "II/1339");
}

#[test]
fn test_safe_override_beats_dataset_entry() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, _, success) = run_annexg(&config_path, &["analyze", "Glycerin", "--json"]);
    assert!(success);
    let job: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(job["result"]["overall"], "safe");
    assert_eq!(job["result"]["ingredients"][0]["match_type"], "safe_list");
}

#[test]
fn test_configured_override_applies() {
    let (_tmp, config_path) = setup_test_env("[matching]\nsafe_overrides = [\"Formalin\"]\n");
    let (stdout, _, success) = run_annexg(&config_path, &["analyze", "formalin", "--json"]);
    assert!(success);
    let job: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(job["result"]["overall"], "safe");
}

#[test]
fn test_empty_input_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, stderr, success) = run_annexg(&config_path, &["analyze", " , , "]);
    assert!(!success);
    assert!(stdout.contains("state:     failed"));
    assert!(stderr.contains("no ingredients found"));
}

#[test]
fn test_unsupported_origin_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, _, success) = run_annexg(
        &config_path,
        &["analyze", "Water", "--origin", "fax", "--json"],
    );
    assert!(!success);
    let job: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(job["status"], "failed");
    assert_eq!(job["error"]["kind"], "unsupported_origin");
}

#[test]
fn test_input_limit_from_config() {
    let (_tmp, config_path) = setup_test_env("[jobs]\nmax_input_chars = 8\n");
    let (stdout, _, success) =
        run_annexg(&config_path, &["analyze", "Water, Glycerin", "--json"]);
    assert!(!success);
    let job: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(job["error"]["kind"], "input_too_long");
}

#[test]
fn test_analyze_reads_file_and_stdin() {
    let (tmp, config_path) = setup_test_env("");
    let list = tmp.path().join("label.txt");
    fs::write(&list, "Aqua, Formaldehyde\n").unwrap();
    let (stdout, _, success) = run_annexg(
        &config_path,
        &["analyze", "--file", list.to_str().unwrap()],
    );
    assert!(success);
    assert!(stdout.contains("overall:   PROHIBITED"));

    let mut child = Command::new(annexg_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["analyze", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"Water, Hydroquinone")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let job: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(job["result"]["overall"], "prohibited");
}

#[test]
fn test_peek_shows_dataset() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, stderr, success) = run_annexg(&config_path, &["peek", "--limit", "2"]);
    assert!(success, "peek failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Version:     it-1"));
    assert!(stdout.contains("Entries:     4"));
    assert!(stdout.contains("CMR:         2"));
    assert!(stdout.contains("Formaldehyde"));
    assert!(stdout.contains("2 more"));
}

#[test]
fn test_peek_json_output() {
    let (_tmp, config_path) = setup_test_env("");
    let (stdout, stderr, success) =
        run_annexg(&config_path, &["peek", "--limit", "2", "--json"]);
    assert!(success, "peek failed: stdout={}, stderr={}", stdout, stderr);
    let view: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(view["version"], "it-1");
    assert_eq!(view["entries"], 4);
    assert_eq!(view["cmr_entries"], 2);
    let sample = view["sample"].as_array().unwrap();
    assert_eq!(sample.len(), 2);
    assert_eq!(sample[0]["canonical_name"], "Formaldehyde");
    assert_eq!(sample[0]["synonyms"], 1);
}

#[test]
fn test_dataset_conflict_logged_once() {
    let (tmp, config_path) = setup_test_env("");
    fs::write(
        tmp.path().join("data/annex_ii.json"),
        r#"[
          {"canonical_name": "Hydroquinone", "regulation_id": "II/1339"},
          {"canonical_name": "Hydroquinone", "regulation_id": "II/9000"}
        ]"#,
    )
    .unwrap();
    let (stdout, stderr, success) = run_annexg(&config_path, &["peek", "--json"]);
    assert!(success, "peek failed: stderr={}", stderr);
    let view: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(view["conflicts"], 1);
    assert_eq!(stderr.matches("dataset integrity conflict").count(), 1);
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config_path) =
        setup_test_env("[matching]\nwarning_threshold = 99.0\nprohibited_threshold = 95.0\n");
    let (_, stderr, success) = run_annexg(&config_path, &["peek"]);
    assert!(!success);
    assert!(stderr.contains("thresholds"));
}

#[test]
fn test_missing_dataset_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("annexg.toml");
    fs::write(&config_path, "[dataset]\npath = \"missing.json\"\n").unwrap();
    let (_, stderr, success) = run_annexg(&config_path, &["analyze", "Water"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read dataset file"));
}
