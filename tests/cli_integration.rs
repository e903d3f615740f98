use serde_json::Value;
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

const CONFIG_FILE: &str = ".qwen3-cli-config.json";
const HISTORY_FILE: &str = ".qwen3-cli-history.json";
const LAST_RESPONSE_FILE: &str = ".qwen3-cli-last-response.json";

fn unique_temp_dir(suffix: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "qwen3-cli-cli-{suffix}-{stamp}-{}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("failed to create temp directory");
    dir
}

fn qwen(workdir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_qwen"));
    cmd.current_dir(workdir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("LOG_OUTPUT")
        .env_remove("QWEN3_API_URL")
        .env_remove("QWEN3_SYSTEM_PROMPT")
        .env_remove("QWEN3_TEMPERATURE")
        .env_remove("QWEN3_TIMEOUT_SECS");
    cmd
}

fn run(workdir: &Path, args: &[&str]) -> Output {
    qwen(workdir)
        .args(args)
        .output()
        .expect("failed to run qwen binary")
}

/// Answers one HTTP request and hands back the raw request body.
fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("address should be available");
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept should succeed");
        let request_body = read_request_body(&mut stream);
        stream
            .write_all(response.as_bytes())
            .expect("response should be written");
        request_body
    });
    (format!("http://{addr}/v1/chat/completions"), handle)
}

fn read_request_body(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream.read(&mut chunk).expect("request should be readable");
        if read == 0 {
            return String::new();
        }
        buf.extend_from_slice(&chunk[..read]);
        let Some(end) = buf.windows(4).position(|window| window == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let length: usize = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return String::from_utf8_lossy(&buf[end + 4..]).to_string();
        }
    }
}

fn write_config(dir: &Path, json: &str) {
    fs::write(dir.join(CONFIG_FILE), json).expect("failed to write config");
}

#[test]
fn set_temperature_persists_the_literal_value() {
    let dir = unique_temp_dir("set-temp");
    let output = run(&dir, &["-T", "0.4"]);
    assert!(output.status.success(), "command should succeed: {output:?}");

    let config = fs::read_to_string(dir.join(CONFIG_FILE)).expect("config should exist");
    assert_eq!(config, "{\n  \"temperature\": \"0.4\"\n}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn invalid_temperature_leaves_config_untouched() {
    let dir = unique_temp_dir("bad-temp");
    let original = "{\n  \"temperature\": \"0.2\"\n}";
    write_config(&dir, original);

    let output = run(&dir, &["--set-temperature", "1.5"]);
    assert!(output.status.success(), "command should succeed: {output:?}");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("between 0.0 and 1.0"),
        "expected validation message, got:\n{stderr}"
    );
    let config = fs::read_to_string(dir.join(CONFIG_FILE)).expect("config should exist");
    assert_eq!(config, original);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn invalid_temperature_without_config_creates_no_file() {
    let dir = unique_temp_dir("bad-temp-empty");
    let output = run(&dir, &["-T", "warm"]);
    assert!(output.status.success(), "command should succeed: {output:?}");
    assert!(!dir.join(CONFIG_FILE).exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn set_prompt_keeps_other_settings() {
    let dir = unique_temp_dir("set-prompt");
    write_config(&dir, r#"{"apiUrl":"http://qwen.test/v1","temperature":"0.3"}"#);

    let output = run(&dir, &["-S", "Answer in haiku."]);
    assert!(output.status.success(), "command should succeed: {output:?}");

    let config: Value = serde_json::from_str(
        &fs::read_to_string(dir.join(CONFIG_FILE)).expect("config should exist"),
    )
    .expect("config should be JSON");
    assert_eq!(config["systemPrompt"], "Answer in haiku.");
    assert_eq!(config["apiUrl"], "http://qwen.test/v1");
    assert_eq!(config["temperature"], "0.3");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn last_save_appends_the_cached_answer_each_time() {
    let dir = unique_temp_dir("last-save");
    fs::write(
        dir.join(LAST_RESPONSE_FILE),
        r#"{"query":"what is a borrow?","response":"a reference","timestamp":"2026-01-01T00:00:00.000Z"}"#,
    )
    .expect("failed to seed last response");

    for _ in 0..2 {
        let output = run(&dir, &["-l", "notes.md"]);
        assert!(output.status.success(), "command should succeed: {output:?}");
    }

    let notes = fs::read_to_string(dir.join("notes.md")).expect("notes should exist");
    assert_eq!(notes.matches("**Query:** what is a borrow?\n").count(), 2);
    assert_eq!(notes.matches("**Response:**\na reference\n\n---\n\n").count(), 2);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn last_save_without_cached_answer_writes_nothing() {
    let dir = unique_temp_dir("last-save-empty");
    let output = run(&dir, &["--last-save", "notes.md"]);
    assert!(output.status.success(), "command should succeed: {output:?}");
    assert!(!dir.join("notes.md").exists());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no last answer"), "unexpected stdout:\n{stdout}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn corrupt_config_falls_back_to_defaults() {
    let dir = unique_temp_dir("corrupt");
    write_config(&dir, "{ definitely not json");

    let output = run(&dir, &["-T", "0.6"]);
    assert!(output.status.success(), "command should succeed: {output:?}");

    let config = fs::read_to_string(dir.join(CONFIG_FILE)).expect("config should exist");
    assert_eq!(config, "{\n  \"temperature\": \"0.6\"\n}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn history_flag_lists_saved_entries() {
    let dir = unique_temp_dir("history");
    let long_answer = "x".repeat(150);
    fs::write(
        dir.join(HISTORY_FILE),
        serde_json::json!([
            {"timestamp": "2026-10-19 09:00:00", "query": "newest", "response": long_answer},
            {"timestamp": "2026-10-18 09:00:00", "query": "older", "response": "short"},
        ])
        .to_string(),
    )
    .expect("failed to seed history");

    let output = run(&dir, &["-h"]);
    assert!(output.status.success(), "command should succeed: {output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[1] 2026-10-19 09:00:00"), "unexpected stdout:\n{stdout}");
    assert!(stdout.contains("Query: newest"));
    assert!(stdout.contains(&format!("Answer: {}...", "x".repeat(100))));
    assert!(!stdout.contains(&"x".repeat(101)));
    assert!(stdout.contains("[2] 2026-10-18 09:00:00"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn one_shot_query_prints_answer_and_records_it() {
    let dir = unique_temp_dir("query");
    let (url, server) = serve_once(
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"Ownership moves values."}}]}"#,
    );
    write_config(&dir, &format!(r#"{{"apiUrl":"{url}","temperature":"0.4"}}"#));

    let output = run(&dir, &["-s", "answer.md", "explain", "ownership"]);
    assert!(output.status.success(), "command should succeed: {output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Ownership moves values."), "unexpected stdout:\n{stdout}");

    let request: Value =
        serde_json::from_str(&server.join().expect("server should join")).expect("request JSON");
    assert_eq!(request["temperature"], 0.4);
    assert_eq!(request["messages"][0]["role"], "system");
    assert_eq!(request["messages"][1]["content"], "explain ownership");

    let history: Value = serde_json::from_str(
        &fs::read_to_string(dir.join(HISTORY_FILE)).expect("history should exist"),
    )
    .expect("history should be JSON");
    assert_eq!(history[0]["query"], "explain ownership");
    assert_eq!(history[0]["response"], "Ownership moves values.");

    let last: Value = serde_json::from_str(
        &fs::read_to_string(dir.join(LAST_RESPONSE_FILE)).expect("last response should exist"),
    )
    .expect("last response should be JSON");
    assert_eq!(last["query"], "explain ownership");

    let saved = fs::read_to_string(dir.join("answer.md")).expect("save file should exist");
    assert!(saved.contains("**Query:** explain ownership"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn one_shot_remote_error_fails_without_recording() {
    let dir = unique_temp_dir("query-error");
    let (url, server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
    write_config(&dir, &format!(r#"{{"apiUrl":"{url}"}}"#));

    let output = run(&dir, &["hello"]);
    assert!(!output.status.success(), "command should fail: {output:?}");
    server.join().expect("server should join");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("500"), "unexpected stderr:\n{stderr}");
    assert!(stderr.contains("boom"), "unexpected stderr:\n{stderr}");
    assert!(!dir.join(HISTORY_FILE).exists());
    assert!(!dir.join(LAST_RESPONSE_FILE).exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn interactive_mode_reads_commands_from_stdin() {
    let dir = unique_temp_dir("interactive");
    let mut child = qwen(&dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn qwen binary");

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"help\nsave \n\nbye\n")
        .expect("failed to write stdin");
    let output = child.wait_with_output().expect("failed to wait for qwen");
    assert!(output.status.success(), "command should succeed: {output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("quit/exit/bye"), "unexpected stdout:\n{stdout}");
    assert!(stdout.contains("Please give a file name"), "unexpected stdout:\n{stdout}");
    assert!(stdout.contains("Goodbye"), "unexpected stdout:\n{stdout}");
    let entries: Vec<_> = fs::read_dir(&dir)
        .expect("workdir should be readable")
        .filter_map(|entry| entry.ok())
        .collect();
    assert!(entries.is_empty(), "interactive session should not write files");

    let _ = fs::remove_dir_all(&dir);
}
