use std::path::PathBuf;
use std::time::Duration;
use webfolio::commands::command_argument_builder;
use webfolio::handlers::*;
use webfolio_core::ReportFormat;

fn capture_args(extra: &[&str]) -> clap::ArgMatches {
    let mut argv = vec!["webfolio", "capture", "-u", "https://example.com/docs"];
    argv.extend_from_slice(extra);
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .expect("arguments should parse");
    let (_, sub) = matches.subcommand().expect("subcommand");
    sub.clone()
}

#[test]
fn test_capture_defaults() {
    let args = capture_args(&[]);
    let request = build_capture_request(&args).unwrap();

    assert_eq!(request.url, "https://example.com/docs");
    assert!(!request.follow_links);
    assert_eq!(request.max_depth, 1);
    assert!(request.session_id.unwrap().starts_with("req_"));

    let config = build_capture_config(&args);
    assert_eq!(config.scratch_dir, PathBuf::from("./temp"));
    assert_eq!(config.navigation_timeout, Duration::from_secs(60));
    assert_eq!(config.settle_delay, Duration::from_millis(5000));
    assert_eq!(parse_report_format(&args), ReportFormat::Text);
}

#[test]
fn test_capture_flags() {
    let args = capture_args(&[
        "--follow-links",
        "-d",
        "3",
        "-s",
        "req_cli",
        "--nav-timeout",
        "15",
        "--settle-ms",
        "0",
        "--format",
        "json",
    ]);
    let request = build_capture_request(&args).unwrap();

    assert!(request.follow_links);
    assert_eq!(request.max_depth, 3);
    assert_eq!(request.session_id.as_deref(), Some("req_cli"));

    let config = build_capture_config(&args);
    assert_eq!(config.navigation_timeout, Duration::from_secs(15));
    assert_eq!(config.settle_delay, Duration::ZERO);
    assert_eq!(parse_report_format(&args), ReportFormat::Json);
}

#[test]
fn test_capture_rejects_zero_depth() {
    let result = command_argument_builder().try_get_matches_from([
        "webfolio",
        "capture",
        "-u",
        "https://example.com",
        "--max-depth",
        "0",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_capture_requires_url() {
    let result = command_argument_builder().try_get_matches_from(["webfolio", "capture"]);
    assert!(result.is_err());
}

#[test]
fn test_chromium_config_from_args() {
    let args = capture_args(&["--chrome", "/usr/bin/chromium-browser", "--headful"]);
    let config = build_chromium_config(&args);
    assert_eq!(
        config.executable,
        Some(PathBuf::from("/usr/bin/chromium-browser"))
    );
    assert!(!config.headless);

    let config = build_chromium_config(&capture_args(&[]));
    assert!(config.headless);
    assert!(config.executable.is_none());
}

#[test]
fn test_fetch_config_uses_scratch_dir() {
    let matches = command_argument_builder()
        .try_get_matches_from([
            "webfolio",
            "fetch",
            "example_com-1-0.pdf",
            "--scratch-dir",
            "/var/tmp/webfolio",
        ])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    let config = build_capture_config(sub);
    assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/webfolio"));
    assert_eq!(config.navigation_timeout, Duration::from_secs(60));
}

#[test]
fn test_expand_path_tilde() {
    let expanded = expand_path("~/captures");
    assert!(!expanded.to_string_lossy().starts_with('~'));
    assert!(expanded.ends_with("captures"));
    assert_eq!(expand_path("./temp"), PathBuf::from("./temp"));
}

#[test]
fn test_default_output_path() {
    assert_eq!(
        default_output_path("example_com-1-0.pdf"),
        PathBuf::from("example_com-1-0.pdf")
    );
    assert_eq!(default_output_path("a/b.pdf"), PathBuf::from("b.pdf"));
}

#[tokio::test]
async fn test_fetch_writes_artifact() -> Result<(), Box<dyn std::error::Error>> {
    let scratch = tempfile::TempDir::new()?;
    std::fs::write(scratch.path().join("example_com-1-0.pdf"), b"%PDF-1.4")?;
    let output = scratch.path().join("copy.pdf");

    let matches = command_argument_builder().try_get_matches_from([
        "webfolio".to_string(),
        "fetch".to_string(),
        "example_com-1-0.pdf".to_string(),
        "--scratch-dir".to_string(),
        scratch.path().display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
    ])?;
    let (_, sub) = matches.subcommand().unwrap();
    handle_fetch(sub).await?;

    assert_eq!(std::fs::read(&output)?, b"%PDF-1.4");
    Ok(())
}

#[tokio::test]
async fn test_fetch_missing_artifact_fails() {
    let scratch = tempfile::TempDir::new().unwrap();
    let matches = command_argument_builder()
        .try_get_matches_from([
            "webfolio".to_string(),
            "fetch".to_string(),
            "nope.pdf".to_string(),
            "--scratch-dir".to_string(),
            scratch.path().display().to_string(),
        ])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    assert!(handle_fetch(sub).await.is_err());
}
