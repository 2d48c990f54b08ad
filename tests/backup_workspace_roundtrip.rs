use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .env_remove("ATTENDANCED_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
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
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn workspace_bundle_roundtrip_restores_and_selects() {
    let source = temp_dir("attendance-backup-src");
    let target = temp_dir("attendance-backup-dst");
    let bundle = source.join("bundle").join("ws.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": source.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "name": "Ann", "classId": "10A", "rollNo": "1" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.mark",
        json!({ "rollNo": "1", "status": "present", "date": "2024-03-01" }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.exportWorkspace",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(
        exported.get("bundleFormat").and_then(|v| v.as_str()),
        Some("attendance-workspace-v1")
    );
    assert_eq!(exported.get("entryCount").and_then(|v| v.as_u64()), Some(3));

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "backup.importWorkspace",
        json!({ "inPath": bundle.to_string_lossy(), "workspacePath": target.to_string_lossy() }),
    );
    assert_eq!(imported.get("tablesRestored").and_then(|v| v.as_u64()), Some(2));

    let health = request_ok(&mut stdin, &mut reader, "6", "health", json!({}));
    let expected = target.to_string_lossy().to_string();
    assert_eq!(
        health.get("workspacePath").and_then(|v| v.as_str()),
        Some(expected.as_str())
    );
    let day = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.day",
        json!({ "date": "2024-03-01" }),
    );
    assert_eq!(
        day.pointer("/rows/0/status").and_then(|v| v.as_str()),
        Some("Present")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn import_rejects_missing_or_foreign_bundles() {
    let ws = temp_dir("attendance-backup-bad");
    let not_zip = ws.join("roster.csv");
    std::fs::write(&not_zip, "Name,Class,RollNo\n").expect("seed");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    for (id, in_path) in [("1", ws.join("missing.zip")), ("2", not_zip)] {
        let resp = request(
            &mut stdin,
            &mut reader,
            id,
            "backup.importWorkspace",
            json!({ "inPath": in_path.to_string_lossy(), "workspacePath": ws.join("dst").to_string_lossy() }),
        );
        assert_eq!(
            resp.pointer("/error/code").and_then(|v| v.as_str()),
            Some("bundle_failed"),
            "{}",
            resp
        );
    }
    assert!(!ws.join("dst").join("students.csv").exists());

    let resp = request(&mut stdin, &mut reader, "3", "backup.importWorkspace", json!({}));
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    drop(stdin);
    let _ = child.wait();
}
