// Report generation for finished capture sessions

use crate::model::CaptureOutcome;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

pub fn generate_capture_report(outcome: &CaptureOutcome, format: ReportFormat) -> String {
    match format {
        ReportFormat::Text => generate_text_report(outcome),
        ReportFormat::Json => generate_json_report(outcome),
    }
}

/// The `{sessionId, artifacts}` body returned to API callers.
pub fn generate_json_report(outcome: &CaptureOutcome) -> String {
    serde_json::to_string_pretty(&outcome.response()).unwrap_or_else(|_| "{}".to_string())
}

pub fn generate_text_report(outcome: &CaptureOutcome) -> String {
    let mut report = String::new();

    let _ = writeln!(report, "{}", "═".repeat(60).bright_blue().bold());
    let _ = writeln!(report, "  {}", "CAPTURE SUMMARY".bright_white().bold());
    let _ = writeln!(report, "{}", "═".repeat(60).bright_blue().bold());
    let _ = writeln!(report, "  Session:        {}", outcome.session_id);
    let _ = writeln!(report, "  Seed:           {}", outcome.seed_url);
    let _ = writeln!(report, "  Pages visited:  {}", outcome.pages_attempted);
    let _ = writeln!(report, "  PDFs generated: {}", outcome.artifacts.len());
    if outcome.pages_failed > 0 {
        let _ = writeln!(
            report,
            "  Failed pages:   {}",
            outcome.pages_failed.to_string().yellow()
        );
    }
    if outcome.cancelled {
        let _ = writeln!(
            report,
            "  {}",
            "Stopped on request; results are partial".yellow().bold()
        );
    }

    if outcome.artifacts.is_empty() {
        let _ = writeln!(report, "\n  {}", "No PDFs were produced.".red());
        return report;
    }

    let _ = writeln!(report, "\n  {}", "Artifacts:".bright_white().bold());
    for artifact in &outcome.artifacts {
        let indent = "  ".repeat(artifact.depth);
        let _ = writeln!(
            report,
            "  {}{} {} {}",
            indent,
            "✓".green(),
            extract_url_path(&artifact.source_url),
            artifact.filename().bright_black()
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use webfolio_capture::CapturedArtifact;

    fn outcome(cancelled: bool) -> CaptureOutcome {
        CaptureOutcome {
            session_id: "req_42_abcdef123".to_string(),
            seed_url: "https://example.com/".to_string(),
            artifacts: vec![
                CapturedArtifact {
                    source_url: "https://example.com/".to_string(),
                    file_path: PathBuf::from("temp/example_com-10-0.pdf"),
                    depth: 0,
                },
                CapturedArtifact {
                    source_url: "https://example.com/docs?x=1".to_string(),
                    file_path: PathBuf::from("temp/example_com-11-1.pdf"),
                    depth: 1,
                },
            ],
            pages_attempted: 3,
            pages_failed: 1,
            cancelled,
        }
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
        assert_eq!(ReportFormat::from_str("pdf"), None);
    }

    #[test]
    fn test_extract_url_path() {
        assert_eq!(extract_url_path("https://example.com"), "/");
        assert_eq!(extract_url_path("https://example.com/docs?x=1#y"), "/docs");
        assert_eq!(extract_url_path("garbage"), "garbage");
    }

    #[test]
    fn test_json_report_lists_filenames() {
        let json: serde_json::Value =
            serde_json::from_str(&generate_json_report(&outcome(false))).unwrap();
        assert_eq!(json["sessionId"], "req_42_abcdef123");
        assert_eq!(json["artifacts"][0]["filename"], "example_com-10-0.pdf");
        assert_eq!(json["artifacts"][1]["filename"], "example_com-11-1.pdf");
    }

    #[test]
    fn test_text_report_mentions_partial_results() {
        colored::control::set_override(false);
        let report = generate_text_report(&outcome(true));
        assert!(report.contains("PDFs generated: 2"));
        assert!(report.contains("Failed pages:   1"));
        assert!(report.contains("Stopped on request"));
        assert!(report.contains("/docs"));
        assert!(report.contains("example_com-11-1.pdf"));
    }
}
