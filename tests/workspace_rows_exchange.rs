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

fn spawn_sidecar(workspace: Option<&Path>) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradetreed");
    let mut cmd = Command::new(exe);
    if let Some(ws) = workspace {
        cmd.arg("--workspace").arg(ws);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradetreed");
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
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value["result"].clone()
}

const SAMPLE_CSV: &str = "Semester,Course,Path,Weight,Grade
1A,CS100,Midterm,30,85
1A,MATH135,,0,0
1A,CS100,Final,40,90
1A,CS100,HW/HW1,15,100
1B,,,0,0
1A,CS100,HW/HW2,15,70
";

#[test]
fn csv_import_export_preserves_rows_and_order() {
    let dir = temp_dir("gradetreed-csv");
    let in_path = dir.join("my_grades.csv");
    let out_path = dir.join("out/export.csv");
    std::fs::write(&in_path, SAMPLE_CSV).expect("write sample csv");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(None);

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "rows.importCsv",
        json!({ "inPath": in_path.to_string_lossy() }),
    );
    assert_eq!(imported["rowCount"], 6);

    let terms = request_ok(&mut stdin, &mut reader, "2", "terms.list", json!({}));
    assert_eq!(terms["terms"], json!(["1A", "1B"]));
    let courses = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.list",
        json!({ "semester": "1A" }),
    );
    assert_eq!(courses["courses"], json!(["CS100", "MATH135"]));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.open",
        json!({ "semester": "1A", "course": "CS100" }),
    );
    let total = opened["total"].as_f64().expect("total");
    assert!((total - 87.0).abs() < 1e-9);

    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "rows.exportCsv",
        json!({ "outPath": out_path.to_string_lossy() }),
    );
    let exported = std::fs::read_to_string(&out_path).expect("read export");
    assert_eq!(exported, SAMPLE_CSV);

    let bad_path = dir.join("bad.csv");
    std::fs::write(
        &bad_path,
        "Semester,Course,Path,Weight,Grade\n1A,CS100,Quiz,abc,1\n",
    )
    .expect("write bad csv");
    let bad = request(
        &mut stdin,
        &mut reader,
        "6",
        "rows.importCsv",
        json!({ "inPath": bad_path.to_string_lossy() }),
    );
    assert_eq!(bad["ok"], false);
    assert_eq!(bad["error"]["code"], "import_failed");
    assert_eq!(bad["error"]["details"]["line"], 2);

    // The failed import left the store alone.
    let rows = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "rows.list",
        json!({ "semester": "1A", "course": "CS100" }),
    );
    assert_eq!(rows["rows"].as_array().map(|r| r.len()), Some(4));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn non_finite_cells_fail_import_and_keep_workspace_in_sync() {
    let dir = temp_dir("gradetreed-nonfinite");
    let workspace = dir.join("ws");
    let in_path = dir.join("grades.csv");
    let bad_path = dir.join("nonfinite.csv");
    std::fs::write(&in_path, SAMPLE_CSV).expect("write sample csv");
    std::fs::write(
        &bad_path,
        "Semester,Course,Path,Weight,Grade\n1A,CS100,A1,10,90\n1A,CS100,A2,nan,90\n1A,CS100,A3,inf,90\n",
    )
    .expect("write non-finite csv");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(Some(&workspace));
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "rows.importCsv",
        json!({ "inPath": in_path.to_string_lossy() }),
    );
    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.open",
        json!({ "semester": "1A", "course": "CS100" }),
    );

    let bad = request(
        &mut stdin,
        &mut reader,
        "3",
        "rows.importCsv",
        json!({ "inPath": bad_path.to_string_lossy() }),
    );
    assert_eq!(bad["ok"], false);
    assert_eq!(bad["error"]["code"], "import_failed");
    assert_eq!(bad["error"]["details"]["line"], 3);

    let restored = request(
        &mut stdin,
        &mut reader,
        "4",
        "backup.import",
        json!({ "inPath": bad_path.to_string_lossy() }),
    );
    assert_eq!(restored["error"]["code"], "import_failed");

    // The open course survives a rejected import.
    let current = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "session.get",
        json!({ "sessionId": opened["sessionId"] }),
    );
    assert_eq!(current["course"], "CS100");

    drop(stdin);
    let _ = child.wait();

    let (mut child, mut stdin, mut reader) = spawn_sidecar(Some(&workspace));
    let health = request_ok(&mut stdin, &mut reader, "6", "health", json!({}));
    assert_eq!(health["rowCount"], 6);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn workspace_keeps_saved_rows_across_restarts() {
    let workspace = temp_dir("gradetreed-workspace");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar(None);
        request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "courses.create",
            json!({ "semester": "2A", "name": "STAT230" }),
        );
        // Empty workspace adopts the in-memory rows.
        let selected = request_ok(
            &mut stdin,
            &mut reader,
            "2",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        assert_eq!(selected["rowCount"], 1);

        request_ok(
            &mut stdin,
            &mut reader,
            "3",
            "session.open",
            json!({ "semester": "2A", "course": "STAT230" }),
        );
        request_ok(
            &mut stdin,
            &mut reader,
            "4",
            "items.add",
            json!({ "name": "Assignments", "kind": "category" }),
        );
        request_ok(
            &mut stdin,
            &mut reader,
            "5",
            "items.add",
            json!({ "parentPath": ["Assignments"], "name": "A1", "weight": 20, "grade": 75 }),
        );
        request_ok(&mut stdin, &mut reader, "6", "session.save", json!({}));
        request_ok(
            &mut stdin,
            &mut reader,
            "7",
            "courses.create",
            json!({ "semester": "2A", "name": "PHYS121" }),
        );
        drop(stdin);
        let _ = child.wait();
    }

    let (mut child, mut stdin, mut reader) = spawn_sidecar(Some(&workspace));
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["rowCount"], 2);
    assert!(health["workspacePath"].is_string());

    let courses = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.list",
        json!({ "semester": "2A" }),
    );
    assert_eq!(courses["courses"], json!(["STAT230", "PHYS121"]));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.open",
        json!({ "semester": "2A", "course": "STAT230" }),
    );
    assert_eq!(opened["items"][0]["name"], "Assignments");
    assert_eq!(opened["items"][0]["subItems"][0]["name"], "A1");
    let total = opened["total"].as_f64().expect("total");
    assert!((total - 15.0).abs() < 1e-9);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn backup_bundle_restores_rows_and_drops_open_course() {
    let dir = temp_dir("gradetreed-backup-ipc");
    let in_path = dir.join("grades.csv");
    let bundle = dir.join("grades.gtbackup.zip");
    std::fs::write(&in_path, SAMPLE_CSV).expect("write sample csv");

    let (mut child, mut stdin, mut reader) = spawn_sidecar(None);
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "rows.importCsv",
        json!({ "inPath": in_path.to_string_lossy() }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], "gradetreed-rows-v1");
    assert_eq!(exported["rowCount"], 6);

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.open",
        json!({ "semester": "1A", "course": "CS100" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "items.delete",
        json!({ "path": ["HW"] }),
    );
    request_ok(&mut stdin, &mut reader, "5", "session.save", json!({}));

    let restored = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(restored["bundleFormatDetected"], "gradetreed-rows-v1");
    assert_eq!(restored["rowCount"], 6);

    let health = request_ok(&mut stdin, &mut reader, "7", "health", json!({}));
    assert_eq!(health["sessionOpen"], false);

    let plain = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "backup.import",
        json!({ "inPath": in_path.to_string_lossy() }),
    );
    assert_eq!(plain["bundleFormatDetected"], "plain-csv");

    let missing = request(
        &mut stdin,
        &mut reader,
        "9",
        "backup.import",
        json!({ "inPath": dir.join("nope.zip").to_string_lossy() }),
    );
    assert_eq!(missing["error"]["code"], "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}
