use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(xdg_config.join("beacon")).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn write_config(&self, contents: &str) {
        fs::write(self.xdg_config.join("beacon/config.toml"), contents)
            .expect("failed to write config");
    }

    fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("failed to write file");
        path
    }
}

fn run_beacon(env: &CliTestEnv, args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("beacon"))
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute beacon: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    assert!(
        output.status.success(),
        "beacon {:?} failed\nstatus: {:?}\nstdout:\n{}\nstderr:\n{}",
        args,
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn status_reports_missing_configuration() {
    let env = CliTestEnv::new();

    let args = ["status"];
    let output = run_beacon(&env, &args);
    assert_success(&args, &output);

    let stdout = stdout_of(&output);
    assert!(stdout.contains("Enabled:         true"));
    assert!(stdout.contains("Server URL:      <not set>"));
    assert!(stdout.contains("Status: Not ready"));
}

#[test]
fn status_reads_config_file() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[pipeline]
server_url = "https://collect.example.com"
api_key = "bk_live_test"
application_id = "com.example.app"
flush_interval_ms = 2000

[gestures]
track_scrolls = false
"#,
    );

    let args = ["status"];
    let output = run_beacon(&env, &args);
    assert_success(&args, &output);

    let stdout = stdout_of(&output);
    assert!(stdout.contains("Server URL:      https://collect.example.com"));
    assert!(stdout.contains("API Key:         <set>"));
    assert!(stdout.contains("Flush Interval:  2000ms"));
    assert!(stdout.contains("Scrolls:         off"));
    assert!(stdout.contains("Status: Ready to send"));
}

#[test]
fn verbose_run_writes_log_file() {
    let env = CliTestEnv::new();

    let args = ["-v", "status"];
    let output = run_beacon(&env, &args);
    assert_success(&args, &output);

    let log_dir = env.xdg_state.join("beacon");
    assert!(stdout_of(&output).contains(&log_dir.join("beacon.log").display().to_string()));

    let logs: String = fs::read_dir(&log_dir)
        .expect("log directory created")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("beacon.log"))
        .map(|entry| fs::read_to_string(entry.path()).expect("readable log"))
        .collect();
    assert!(logs.contains("beacon command started"));
    assert!(logs.contains("command=\"status\""));
}

#[test]
fn status_rejects_malformed_config() {
    let env = CliTestEnv::new();
    let path = env.write_file("broken.toml", "[pipeline\nenabled = ");

    let output = run_beacon(&env, &["--config", path.to_str().unwrap(), "status"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load configuration"));
}

#[test]
fn send_without_server_is_a_no_op() {
    let env = CliTestEnv::new();

    let args = ["send", "app_opened", "--props", r#"{"cold": true}"#];
    let output = run_beacon(&env, &args);
    assert_success(&args, &output);
    assert!(stdout_of(&output).contains("Pipeline is not configured"));
}

fn replay(env: &CliTestEnv, trace: &Path) -> Vec<serde_json::Value> {
    let args = ["replay", trace.to_str().unwrap(), "--seed", "1"];
    let output = run_beacon(env, &args);
    assert_success(&args, &output);

    stdout_of(&output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("record is JSON"))
        .collect()
}

#[test]
fn replay_classifies_touch_trace() {
    let env = CliTestEnv::new();
    let trace = env.write_file(
        "trace.jsonl",
        r#"{"t": 0, "kind": "screen", "name": "feed"}
{"t": 10, "kind": "down", "x": 10, "y": 10, "force": 0.5}
{"t": 90, "kind": "up", "x": 12, "y": 11}
{"t": 1000, "kind": "down", "x": 300, "y": 500}
{"t": 1200, "kind": "up", "x": 300, "y": 380}

{"t": 2000, "kind": "down", "x": 50, "y": 50}
{"t": 2800, "kind": "up", "x": 50, "y": 50}
{"t": 3000, "kind": "scroll", "y": 50, "content": 200, "viewport": 100}
{"t": 3100, "kind": "scroll", "y": 20, "content": 200, "viewport": 100}
{"t": 3200, "kind": "pinch", "scale": 1.8, "x": 160, "y": 240}
"#,
    );

    let records = replay(&env, &trace);
    let kinds: Vec<String> = records
        .iter()
        .map(|r| {
            r["gesture"]
                .as_str()
                .or_else(|| r["type"].as_str())
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(kinds, vec!["tap", "swipe", "long_press", "scroll", "pinch"]);

    assert_eq!(records[0]["screen"], "feed");
    assert_eq!(records[1]["direction"], "up");
    assert_eq!(records[2]["x"], 50.0);
    assert_eq!(records[3]["depth"], 50);
    assert_eq!(records[4]["scale"], 1.8);
}

#[test]
fn replay_reports_bad_lines() {
    let env = CliTestEnv::new();
    let trace = env.write_file("bad.jsonl", "{\"t\": 0, \"kind\": \"wiggle\"}\n");

    let output = run_beacon(&env, &["replay", trace.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad.jsonl:1"));
}
