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

#[test]
fn bundle_export_then_import_restores_registry_over_ipc() {
    let workspace = temp_dir("submissionsd-bundle-ipc");
    let bundle = workspace.join("out").join("registry.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar_with(&workspace, &[]);

    for (i, (name, subject, grade)) in [("Ana", "Math", "1.5"), ("Ben", "Science", "2.0"), ("Ana", "Art", "1.0")]
        .iter()
        .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("u{}", i),
            "submissions.upsert",
            json!({ "name": name, "subject": subject, "grade": grade }),
        );
    }
    let before = request_ok(&mut stdin, &mut reader, "l1", "submissions.list", json!({}))
        .get("submissions")
        .cloned()
        .expect("submissions");

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "e",
        "backup.exportBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported.get("recordCount").and_then(|v| v.as_u64()), Some(2));

    let first_id = before[0].get("id").and_then(|v| v.as_str()).expect("id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "d",
        "submissions.delete",
        json!({ "id": first_id }),
    );

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "i",
        "backup.importBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported.get("recordCount").and_then(|v| v.as_u64()), Some(2));

    let after = request_ok(&mut stdin, &mut reader, "l2", "submissions.list", json!({}))
        .get("submissions")
        .cloned()
        .expect("submissions");
    assert_eq!(after, before);

    let missing = request(
        &mut stdin,
        &mut reader,
        "m",
        "backup.importBundle",
        json!({ "inPath": workspace.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(error_code(&missing), "bundle_import_failed");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn legacy_import_with_repeated_id_leaves_registry_untouched() {
    let workspace = temp_dir("submissionsd-bundle-dup-id");
    let legacy = workspace.join("submissions.json");
    std::fs::write(
        &legacy,
        json!([
            { "id": "x", "name": "Ana", "grades": [{ "subject": "Math", "grade": "1.5" }] },
            { "id": "x", "name": "Ben", "grades": [{ "subject": "Math", "grade": "2.0" }] },
        ])
        .to_string(),
    )
    .expect("write legacy export");
    let (mut child, mut stdin, mut reader) = spawn_sidecar_with(&workspace, &[]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "submissions.upsert",
        json!({ "name": "Cara", "subject": "Art", "grade": "1.0" }),
    );
    let before = request_ok(&mut stdin, &mut reader, "2", "submissions.list", json!({}));

    let imported = request(
        &mut stdin,
        &mut reader,
        "3",
        "backup.importBundle",
        json!({ "inPath": legacy.to_string_lossy() }),
    );
    assert_eq!(error_code(&imported), "duplicate_id");

    let after = request_ok(&mut stdin, &mut reader, "4", "submissions.list", json!({}));
    assert_eq!(after.get("submissions"), before.get("submissions"));
    assert_eq!(after.get("revision"), before.get("revision"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
