//! CLI integration tests
use predicates::prelude::*;
use tempfile::TempDir;

const SOURCE_URL: &str = "https://slowkitchen.example/posts/sourdough";

fn cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("longreader")
}

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

fn article() -> String {
    get_fixture_path("article.html")
}

#[test]
fn test_cli_file_input() {
    cmd()
        .arg(article())
        .assert()
        .success()
        .stdout(predicate::str::contains("## What actually happens during a long ferment"))
        .stdout(predicate::str::contains("Subscribe to our newsletter").not());
}

#[test]
fn test_cli_stdin_input() {
    let html = std::fs::read_to_string(article()).unwrap();
    cmd()
        .arg("-")
        .write_stdin(html)
        .assert()
        .success()
        .stdout(predicate::str::contains("Watch the dough, not the clock."));
}

#[test]
fn test_cli_json_format() {
    let output = cmd().args(["-f", "json", "--url", SOURCE_URL, &article()]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["title"], "Why Sourdough Needs Patience");
    assert_eq!(json["metadata"]["source_url"], SOURCE_URL);
    assert_eq!(json["metadata"]["author"], "Marta Kowalski");
    assert!(json["short_description"].is_string());
}

#[test]
fn test_cli_invalid_format() {
    cmd().args(["-f", "html", &article()]).assert().failure();
}

#[test]
fn test_cli_frontmatter() {
    cmd()
        .args(["--frontmatter", &article()])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("+++\ntitle = \"Why Sourdough Needs Patience\""))
        .stdout(predicate::str::contains("reading_time = "));
}

#[test]
fn test_cli_source_url_resolves_links() {
    cmd()
        .args(["--url", SOURCE_URL, &article()])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://slowkitchen.example/images/crumb.jpg"));
}

#[test]
fn test_cli_no_images() {
    cmd()
        .args(["--no-images", &article()])
        .assert()
        .success()
        .stdout(predicate::str::contains("crumb.jpg").not());
}

#[test]
fn test_cli_favor_recall() {
    cmd().args(["--favor-recall", &article()]).assert().success();
}

#[test]
fn test_cli_output_file() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("output.md");

    cmd()
        .args(["-o", output.to_str().unwrap()])
        .arg(article())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = std::fs::read_to_string(output).unwrap();
    assert!(written.contains("Watch the dough, not the clock."));
}

#[test]
fn test_cli_debug_dir() {
    let tmp = TempDir::new().unwrap();

    cmd()
        .args(["--url", SOURCE_URL, "--debug-dir", tmp.path().to_str().unwrap(), &article()])
        .assert()
        .success();

    assert!(tmp.path().join("slowkitchen-example-posts-sourdough.html").exists());
    assert!(tmp.path().join("slowkitchen-example-posts-sourdough.md").exists());
}

#[test]
fn test_cli_invalid_file() {
    cmd()
        .arg("nonexistent.html")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn test_cli_min_size_rejects_short_article() {
    cmd()
        .args(["--min-size", "1000000", &article()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No readable article"));
}

#[test]
fn test_cli_empty_stdin() {
    cmd().arg("-").write_stdin("").assert().failure();
}

#[test]
fn test_cli_verbose() {
    cmd()
        .args(["-v", &article()])
        .assert()
        .success()
        .stderr(predicate::str::contains("Longreader"))
        .stderr(predicate::str::contains("Reading time:"));
}
