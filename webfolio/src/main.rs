use colored::Colorize;
use tracing_subscriber::EnvFilter;
use webfolio::commands::command_argument_builder;
use webfolio::handlers::{handle_capture, handle_fetch};
use webfolio_core::print_banner;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    // RUST_LOG=webfolio_capture=debug shows every navigation and scroll step
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let result = match chosen_command.subcommand() {
        Some(("capture", primary_command)) => handle_capture(primary_command, quiet).await,
        Some(("fetch", primary_command)) => handle_fetch(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
