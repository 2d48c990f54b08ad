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

fn run(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    text: &str,
) -> serde_json::Value {
    request_ok(stdin, reader, id, "nlp.run", json!({ "text": text }))
}

fn status_message(result: &serde_json::Value) -> (bool, String) {
    assert_eq!(
        result.get("kind").and_then(|v| v.as_str()),
        Some("status"),
        "expected status, got {}",
        result
    );
    (
        result.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        result
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    )
}

fn fragment_type(result: &serde_json::Value) -> Option<&str> {
    if result.get("kind").and_then(|v| v.as_str()) != Some("fragment") {
        return None;
    }
    result.pointer("/fragment/type").and_then(|v| v.as_str())
}

#[test]
fn typed_commands_drive_roster_and_ledger() {
    let workspace = temp_dir("attendance-nlp-flow");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "0",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let (ok, message) = status_message(&run(&mut stdin, &mut reader, "1", "show students"));
    assert!(!ok);
    assert_eq!(message, "❌ No students found.");

    let (ok, message) = status_message(&run(
        &mut stdin,
        &mut reader,
        "2",
        "Add student anna class 10a roll 12",
    ));
    assert!(ok, "{}", message);
    assert!(message.starts_with("✅"));
    let roster = std::fs::read_to_string(workspace.join("students.csv")).expect("roster");
    assert_eq!(roster, "Name,Class,RollNo\nAnna,10A,12\n");

    let list = run(&mut stdin, &mut reader, "3", "show students");
    assert_eq!(fragment_type(&list), Some("studentList"));
    assert_eq!(
        list.pointer("/fragment/students/0/rollNo").and_then(|v| v.as_str()),
        Some("12")
    );

    let (ok, _) = status_message(&run(&mut stdin, &mut reader, "4", "MARK anna present"));
    assert!(ok);
    let (ok, _) = status_message(&run(&mut stdin, &mut reader, "5", "mark Anna PRESENT"));
    assert!(ok);
    let attendance = std::fs::read_to_string(workspace.join("attendance.csv")).expect("attendance");
    assert_eq!(attendance.lines().count(), 2, "{}", attendance);
    assert!(attendance.lines().nth(1).unwrap_or("").ends_with(",Anna,10A,12,Present"));

    let today = request_ok(&mut stdin, &mut reader, "6", "attendance.day", json!({}));
    assert_eq!(
        today.pointer("/rows/0/status").and_then(|v| v.as_str()),
        Some("Present")
    );

    let (ok, message) = status_message(&run(&mut stdin, &mut reader, "7", "mark zoe absent"));
    assert!(!ok);
    assert_eq!(message, "❌ Student zoe not found");

    let (ok, message) = status_message(&run(&mut stdin, &mut reader, "8", "delete student anna"));
    assert!(ok);
    assert!(message.starts_with("🗑️"));
    let (ok, _) = status_message(&run(&mut stdin, &mut reader, "9", "delete student anna"));
    assert!(!ok);

    // history survives the delete
    let attendance_after = std::fs::read_to_string(workspace.join("attendance.csv")).expect("attendance");
    assert_eq!(attendance_after, attendance);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn recognizer_order_decides_ambiguous_text() {
    let workspace = temp_dir("attendance-nlp-order");
    std::fs::write(workspace.join("students.csv"), "Name,Class,RollNo\nAnn,10A,1\n").expect("seed");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "0",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let marked = run(&mut stdin, &mut reader, "1", "mark ann absent on 2024-01-02");
    let (ok, message) = status_message(&marked);
    assert!(ok, "{}", message);
    let attendance = std::fs::read_to_string(workspace.join("attendance.csv")).expect("attendance");
    assert!(!attendance.contains("2024-01-02"));

    let lookup = run(&mut stdin, &mut reader, "2", "attendance on 2024-01-02");
    assert_eq!(fragment_type(&lookup), Some("dayView"));
    assert_eq!(
        lookup.pointer("/fragment/rows/0/status").and_then(|v| v.as_str()),
        Some("Not Marked")
    );

    let report = run(&mut stdin, &mut reader, "3", "show report for march");
    assert_eq!(fragment_type(&report), Some("monthReport"));
    assert_eq!(report.pointer("/fragment/month").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(
        report.pointer("/fragment/monthName").and_then(|v| v.as_str()),
        Some("March")
    );

    let (ok, message) = status_message(&run(&mut stdin, &mut reader, "4", "show report for marchy"));
    assert!(!ok);
    assert_eq!(message, "❌ Could not understand month in report query");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn bulk_class_import_and_roster_reset() {
    let workspace = temp_dir("attendance-nlp-class");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "0",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let (ok, message) = status_message(&run(&mut stdin, &mut reader, "1", "add class 9c"));
    assert!(!ok);
    assert_eq!(message, "❌ CSV file '9c.csv' not found.");

    std::fs::write(workspace.join("9c.csv"), "Cy,9C,31\n\"Lee, Jo\",9C,32\n").expect("seed class");
    let (ok, message) = status_message(&run(&mut stdin, &mut reader, "2", "please add class 9c"));
    assert!(ok, "{}", message);

    let list = request_ok(&mut stdin, &mut reader, "3", "students.list", json!({}));
    let names: Vec<&str> = list
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students")
        .iter()
        .filter_map(|s| s.get("name").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(names, vec!["Cy", "Lee, Jo"]);

    let (ok, message) = status_message(&run(&mut stdin, &mut reader, "4", "remove all students"));
    assert!(ok);
    assert_eq!(message, "🗑️ All students have been removed.");
    let roster = std::fs::read_to_string(workspace.join("students.csv")).expect("roster");
    assert_eq!(roster, "Name,Class,RollNo\n");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unknown_text_never_fails_the_request() {
    let workspace = temp_dir("attendance-nlp-fallback");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "0",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (i, text) in ["", "good morning", "remove all students please", "mark everyone"]
        .iter()
        .enumerate()
    {
        let (ok, message) = status_message(&run(&mut stdin, &mut reader, &i.to_string(), text));
        assert!(!ok);
        assert_eq!(message, "❌ Sorry, I could not understand your command");
    }

    let resp = request(&mut stdin, &mut reader, "x", "nlp.run", json!({}));
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    drop(stdin);
    let _ = child.wait();
}
