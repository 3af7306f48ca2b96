use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn run_typtag(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_typtag"))
        .args(args)
        .output()
        .expect("failed to execute typtag");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();

    (stdout, stderr, success)
}

fn write_source(dir: &TempDir, source: &str) -> String {
    let file = dir.path().join("main.js");
    std::fs::write(&file, source).unwrap();
    file.to_str().unwrap().to_string()
}

fn check_source(source: &str, extra: &[&str]) -> (String, String, bool) {
    // Each test gets its own directory so no typtag.toml leaks in
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, source);
    let mut args = vec!["check", file.as_str()];
    args.extend(extra);
    run_typtag(&args)
}

fn assert_success(source: &str) -> String {
    let (stdout, stderr, success) = check_source(source, &[]);
    assert!(success, "check should succeed, stdout:\n{}\nstderr:\n{}", stdout, stderr);
    stdout
}

fn assert_failure(source: &str) -> String {
    let (stdout, _, success) = check_source(source, &[]);
    assert!(!success, "check should fail, stdout:\n{}", stdout);
    stdout
}

#[test]
fn test_check_passes() {
    let stdout = assert_success(
        r#"
var total = number`0`;
function add(a, b) {
    return a + b;
}
total = add(1, 2);
"#,
    );
    assert_eq!(stdout, "Type check passed.\n");
}

#[test]
fn test_check_reports_errors() {
    let stdout = assert_failure("var a = int`3`;\na = \"x\";\n");
    assert!(stdout.contains("error[E113]"), "stdout:\n{}", stdout);
    assert!(stdout.contains("main.js:2:"), "stdout:\n{}", stdout);
    assert!(stdout.ends_with("1 error found (1 pass)\n"), "stdout:\n{}", stdout);
}

#[test]
fn test_check_error_count_plural() {
    let stdout = assert_failure("var a = \"x\" + 1;\nvar b = 1 < \"y\";\n");
    assert!(stdout.contains("error[E121]"));
    assert!(stdout.contains("error[E122]"));
    assert!(stdout.contains("2 errors found"));
}

#[test]
fn test_check_json_output() {
    let (stdout, _, success) = check_source("var a = int`3`;\na = \"x\";\n", &["--format", "json"]);
    assert!(!success);

    let diagnostics: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let diagnostics = diagnostics.as_array().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0]["code"], 113);
    assert_eq!(diagnostics[0]["severity"], "error");
    assert_eq!(diagnostics[0]["name"], "assignment-type");
    assert_eq!(diagnostics[0]["span"]["line"], 2);
}

#[test]
fn test_check_info_flag() {
    let source = "var a;\nvar b = a;\na = 2;\n";
    let (stdout, _, _) = check_source(source, &[]);
    assert!(!stdout.contains("info[I"), "stdout:\n{}", stdout);

    let (stdout, _, _) = check_source(source, &["--info"]);
    assert!(stdout.contains("info[I105]"), "stdout:\n{}", stdout);
}

#[test]
fn test_check_strict_equality_flag() {
    let source = "var k = 1 === 2;\n";
    let (stdout, _, success) = check_source(source, &[]);
    assert!(!success);
    assert!(stdout.contains("error[E128]"));

    let (stdout, _, success) = check_source(source, &["--strict-equality", "info"]);
    assert!(success, "stdout:\n{}", stdout);
}

#[test]
fn test_check_pass_limit_flag() {
    let source = "function f() { var x = f(); return 1; }\n";
    let (stdout, _, success) = check_source(source, &["--pass-limit", "2"]);
    assert!(!success);
    assert!(stdout.contains("error[E149]"));
    assert!(stdout.contains("limit: 2"), "stdout:\n{}", stdout);

    let (_, stderr, success) = check_source(source, &["--pass-limit", "0"]);
    assert!(!success);
    assert!(stderr.contains("pass_limit must be at least 1"));
}

#[test]
fn test_config_file_discovered() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("typtag.toml"),
        "[check]\nstrict_equality = \"info\"\nformat = \"json\"\n",
    )
    .unwrap();
    let file = write_source(&dir, "var k = 1 === 2;\n");

    let (stdout, stderr, success) = run_typtag(&["check", &file]);
    assert!(success, "stderr:\n{}", stderr);
    assert_eq!(stdout.trim(), "[]");
}

#[test]
fn test_config_file_explicit() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("custom.toml");
    std::fs::write(&config, "[check]\nformat = \"json\"\n").unwrap();
    let file = write_source(&dir, "var a = 1;\n");

    let (stdout, _, success) = run_typtag(&["check", &file, "--config", config.to_str().unwrap()]);
    assert!(success);
    assert_eq!(stdout.trim(), "[]");
}

#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("typtag.toml"), "[check]\npasses = 3\n").unwrap();
    let file = write_source(&dir, "var a = 1;\n");

    let (_, stderr, success) = run_typtag(&["check", &file]);
    assert!(!success);
    assert!(stderr.contains("failed to parse"), "stderr:\n{}", stderr);
}

#[test]
fn test_syntax_error() {
    let (stdout, stderr, success) = check_source("var a = (1;\n", &[]);
    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.starts_with("error:"), "stderr:\n{}", stderr);
    assert!(stderr.contains("main.js:1:"));
}

#[test]
fn test_missing_file() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("does-not-exist.js");
    let (_, stderr, success) = run_typtag(&["check", path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("failed to read"));
}

#[test]
fn test_shape_command() {
    let (stdout, _, success) = run_typtag(&["shape", "int[]"]);
    assert!(success);
    assert_eq!(stdout, "int[]\n");

    let (stdout, _, success) = run_typtag(&["shape", " < int , string[] > "]);
    assert!(success);
    assert_eq!(stdout, "<int,string[]>\n");

    let (_, stderr, success) = run_typtag(&["shape", "int"]);
    assert!(!success);
    assert!(stderr.contains("is not an array"), "stderr:\n{}", stderr);
}

#[test]
fn test_validate_command() {
    let (stdout, _, success) = run_typtag(&["validate", "int", "42"]);
    assert!(success);
    assert_eq!(stdout, "number: 42\n");

    let (stdout, _, success) = run_typtag(&["validate", "array", "[1, 2]", "--shape", "int[]"]);
    assert!(success);
    assert_eq!(stdout, "object: 1,2\n");

    let (_, stderr, success) = run_typtag(&["validate", "array", "arrs"]);
    assert!(!success);
    assert!(stderr.contains("'arrs' is not type: array"), "stderr:\n{}", stderr);

    let (_, stderr, success) = run_typtag(&["validate", "float", "1"]);
    assert!(!success);
    assert!(stderr.contains("unknown type: float"));
}
