//! End-to-end runs of the `mathclip` binary.
#![cfg(feature = "cli")]

use std::io::Write;
use std::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_mathclip");

fn page(html: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    file.write_all(html.as_bytes()).unwrap();
    file
}

#[test]
fn test_prints_blocks_separated_by_blank_lines() {
    let file = page(r#"<p><span data-latex="a^2">a</span> and <span data-latex="\beta">b</span></p>"#);
    let out = Command::new(BIN)
        .args(["-f", "latex"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "a^2\n\n\\beta\n");
}

#[test]
fn test_json_records() {
    let file = page("<math><msup><mi>x</mi><mn>2</mn></msup></math>");
    let out = Command::new(BIN)
        .args(["--json", "--format", "unicode"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(out.status.success());
    let records: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(records[0]["kind"], "mathml");
    assert_eq!(records[0]["content"], "x²");
}

#[test]
fn test_windows_1252_page() {
    let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
    file.write_all(b"<meta charset=\"windows-1252\"><div class=\"math\">x \xb1 1</div>")
        .unwrap();
    let out = Command::new(BIN)
        .args(["-f", "unicode"])
        .arg(file.path())
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&out.stdout), "x ± 1\n");
}

#[test]
fn test_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(BIN)
        .arg(dir.path().join("absent.html"))
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).starts_with("error: I/O error"));
}

#[test]
fn test_unknown_format_is_a_usage_error() {
    let file = page("<math><mi>x</mi></math>");
    let out = Command::new(BIN)
        .args(["-f", "png"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(!out.status.success());
}
