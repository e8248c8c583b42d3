use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("webfolio")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("webfolio")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("capture")
                .about(
                    "Capture a page as PDF, optionally following same-origin links up to a \
                maximum depth. Press Ctrl-C to stop early and keep what was captured.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The seed URL to capture")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-f --"follow-links")
                        .required(false)
                        .help("Follow links to other pages on the same host")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-d --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Maximum link depth; 1 captures only the seed page")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("1"),
                )
                .arg(
                    arg!(-s --"session-id" <ID>)
                        .required(false)
                        .help("Session id to report results under (generated if omitted)"),
                )
                .arg(
                    arg!(--"scratch-dir" <PATH>)
                        .required(false)
                        .help("Directory the PDFs are written to")
                        .default_value("./temp"),
                )
                .arg(
                    arg!(--"chrome" <PATH>)
                        .required(false)
                        .help("Path to the Chrome/Chromium executable (auto-detected if omitted)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"headful")
                        .required(false)
                        .help("Show the browser window while capturing")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"nav-timeout" <SECONDS>)
                        .required(false)
                        .help("Navigation timeout per page in seconds")
                        .value_parser(clap::value_parser!(u64).range(1..))
                        .default_value("60"),
                )
                .arg(
                    arg!(--"settle-ms" <MILLISECONDS>)
                        .required(false)
                        .help("Time to wait after scrolling before printing each page")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("5000"),
                )
                .arg(
                    arg!(--"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("fetch")
                .about("Copy a generated PDF out of scratch storage")
                .arg(
                    arg!(<NAME>)
                        .required(true)
                        .help("Artifact filename as reported by capture"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Where to write the file (default: ./<NAME>)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"scratch-dir" <PATH>)
                        .required(false)
                        .help("Directory the PDFs were written to")
                        .default_value("./temp"),
                ),
        )
}
