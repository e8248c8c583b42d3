use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::Url;
use webfolio_capture::{CaptureConfig, ChromiumConfig, ChromiumLauncher};
use webfolio_core::{
    CaptureRequest, CaptureService, ReportFormat, generate_capture_report, generate_session_id,
};

// Helper functions for capture handler

/// Expand a leading `~` in a user supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Build the capture configuration from `capture` (or `fetch`) arguments
pub fn build_capture_config(args: &ArgMatches) -> CaptureConfig {
    let mut config = CaptureConfig::default();

    if let Some(dir) = args.get_one::<String>("scratch-dir") {
        config = config.with_scratch_dir(expand_path(dir));
    }
    if let Ok(Some(secs)) = args.try_get_one::<u64>("nav-timeout") {
        config = config.with_navigation_timeout(Duration::from_secs(*secs));
    }
    if let Ok(Some(ms)) = args.try_get_one::<u64>("settle-ms") {
        config = config.with_settle_delay(Duration::from_millis(*ms));
    }

    config
}

pub fn build_chromium_config(args: &ArgMatches) -> ChromiumConfig {
    let mut config = ChromiumConfig::default().with_headless(!args.get_flag("headful"));
    if let Some(path) = args.get_one::<PathBuf>("chrome") {
        config = config.with_executable(path);
    }
    config
}

/// Build the capture request, generating a session id up front so Ctrl-C can
/// refer to it.
pub fn build_capture_request(args: &ArgMatches) -> Result<CaptureRequest> {
    let url = args
        .get_one::<Url>("url")
        .context("--url is required")?;
    let max_depth = *args.get_one::<u64>("max-depth").unwrap_or(&1);
    let session_id = args
        .get_one::<String>("session-id")
        .cloned()
        .unwrap_or_else(generate_session_id);

    Ok(CaptureRequest::new(url.as_str())
        .with_follow_links(args.get_flag("follow-links"))
        .with_max_depth(usize::try_from(max_depth).context("--max-depth is too large")?)
        .with_session_id(session_id))
}

pub fn parse_report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

/// Default location for a fetched artifact: the file name in the working directory
pub fn default_output_path(name: &str) -> PathBuf {
    Path::new(name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("artifact.pdf"))
}

pub async fn handle_capture(args: &ArgMatches, quiet: bool) -> Result<()> {
    let request = build_capture_request(args)?;
    let config = build_capture_config(args);
    let format = parse_report_format(args);
    let session_id = request
        .session_id
        .clone()
        .context("session id should have been assigned")?;

    let show_progress = !quiet && format == ReportFormat::Text;
    if show_progress {
        println!("\n{} Capturing {}", "→".blue(), request.url.bright_white());
        println!(
            "Follow links: {}  Max depth: {}  Scratch: {}\n",
            request.follow_links,
            request.max_depth,
            config.scratch_dir.display()
        );
    }

    let service = Arc::new(CaptureService::new(
        ChromiumLauncher::new(build_chromium_config(args)),
        config,
    ));

    // Ctrl-C asks the traversal to stop at its next checkpoint
    let stopper = service.clone();
    let stop_id = session_id.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Stop requested, finishing current page...", "⚠".yellow());
            if let Err(e) = stopper.request_stop(&stop_id) {
                warn!("{}", e);
            }
        }
    });

    let spinner = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .context("invalid spinner template")?,
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Launching browser...");
        Some(pb)
    } else {
        None
    };

    let progress = spinner.clone().map(|pb| {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        Arc::new(move |artifact: &webfolio_capture::CapturedArtifact| {
            let n = count.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            pb.set_message(format!("{} PDFs, last: {}", n, artifact.source_url));
        }) as webfolio_capture::ArtifactCallback
    });

    let result = service.capture_with(request, progress).await;
    ctrl_c.abort();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let outcome = result.with_context(|| format!("capture session {} failed", session_id))?;
    print!("{}", generate_capture_report(&outcome, format));
    if format == ReportFormat::Json {
        println!();
    }
    Ok(())
}

pub async fn handle_fetch(args: &ArgMatches) -> Result<()> {
    let name = args
        .get_one::<String>("NAME")
        .context("artifact name is required")?;
    let output = args
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| default_output_path(name));

    let service = CaptureService::new(ChromiumLauncher::default(), build_capture_config(args));
    let bytes = service
        .fetch_artifact(name)
        .await
        .with_context(|| format!("could not fetch {}", name))?;

    tokio::fs::write(&output, &bytes)
        .await
        .with_context(|| format!("could not write {}", output.display()))?;

    println!(
        "{} Wrote {} ({} bytes)",
        "✓".green().bold(),
        output.display().to_string().bright_white(),
        bytes.len()
    );
    Ok(())
}
