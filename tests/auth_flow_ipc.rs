use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar_with(cwd: &Path, envs: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_submissionsd");
    let mut cmd = Command::new(exe);
    cmd.current_dir(cwd)
        .env_remove("SUBMISSIONSD_WORKSPACE")
        .env_remove("SUBMISSIONSD_PERSIST_SUBMISSIONS")
        .env_remove("SUBMISSIONSD_REQUIRE_LOGIN")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn submissionsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false), "expected failure: {}", value);
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn register_params(username: &str) -> serde_json::Value {
    json!({
        "firstName": "Ana",
        "lastName": "Cruz",
        "username": username,
        "email": "ana@example.com",
        "contactNumber": "09171234567",
        "password": "hunter2"
    })
}

#[test]
fn auth_methods_need_a_workspace() {
    let cwd = temp_dir("submissionsd-auth-no-ws");
    let (mut child, mut stdin, mut reader) = spawn_sidecar_with(&cwd, &[]);

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "auth.register",
        register_params("ana"),
    );
    assert_eq!(error_code(&resp), "no_workspace");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(cwd);
}

#[test]
fn register_login_profile_logout_roundtrip() {
    let workspace = temp_dir("submissionsd-auth");
    let (mut child, mut stdin, mut reader) = spawn_sidecar_with(&workspace, &[]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let not_logged_in = request(&mut stdin, &mut reader, "2", "auth.currentUser", json!({}));
    assert_eq!(error_code(&not_logged_in), "not_logged_in");

    let bad_email = request(
        &mut stdin,
        &mut reader,
        "3",
        "auth.register",
        json!({
            "firstName": "Ana",
            "lastName": "Cruz",
            "username": "ana",
            "email": "not-an-email",
            "contactNumber": "09171234567",
            "password": "hunter2"
        }),
    );
    assert_eq!(error_code(&bad_email), "validation_failed");

    let registered = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.register",
        register_params("ana"),
    );
    assert_eq!(registered.get("username").and_then(|v| v.as_str()), Some("ana"));

    let taken = request(
        &mut stdin,
        &mut reader,
        "5",
        "auth.register",
        register_params("ana"),
    );
    assert_eq!(error_code(&taken), "username_taken");

    let wrong = request(
        &mut stdin,
        &mut reader,
        "6",
        "auth.login",
        json!({ "username": "ana", "password": "nope" }),
    );
    assert_eq!(error_code(&wrong), "auth_failed");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "auth.login",
        json!({ "username": "ana", "password": "hunter2" }),
    );
    let me = request_ok(&mut stdin, &mut reader, "8", "auth.currentUser", json!({}));
    let user = me.get("user").cloned().expect("user");
    assert_eq!(user.get("email").and_then(|v| v.as_str()), Some("ana@example.com"));
    assert!(user.get("password").is_none());

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "auth.setProfileImage",
        json!({ "uri": "file:///photos/me.png" }),
    );
    assert_eq!(
        updated
            .get("user")
            .and_then(|u| u.get("profileImage"))
            .and_then(|v| v.as_str()),
        Some("file:///photos/me.png")
    );

    let out = request_ok(&mut stdin, &mut reader, "10", "auth.logout", json!({}));
    assert_eq!(out.get("loggedOut").and_then(|v| v.as_bool()), Some(true));
    let gone = request(&mut stdin, &mut reader, "11", "auth.currentUser", json!({}));
    assert_eq!(error_code(&gone), "not_logged_in");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn login_gate_blocks_mutations_until_signed_in() {
    let workspace = temp_dir("submissionsd-auth-gate");
    let (mut child, mut stdin, mut reader) =
        spawn_sidecar_with(&workspace, &[("SUBMISSIONSD_REQUIRE_LOGIN", "true")]);

    let no_ws = request(
        &mut stdin,
        &mut reader,
        "1",
        "submissions.upsert",
        json!({ "name": "Ana", "subject": "Math", "grade": "1.5" }),
    );
    assert_eq!(error_code(&no_ws), "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let blocked = request(
        &mut stdin,
        &mut reader,
        "3",
        "submissions.upsert",
        json!({ "name": "Ana", "subject": "Math", "grade": "1.5" }),
    );
    assert_eq!(error_code(&blocked), "not_logged_in");

    let _ = request_ok(&mut stdin, &mut reader, "4", "auth.register", register_params("ana"));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "auth.login",
        json!({ "username": "ana", "password": "hunter2" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "submissions.upsert",
        json!({ "name": "Ana", "subject": "Math", "grade": "1.5" }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
