//! Binary entry point: parses arguments, wires up tracing, runs the
//! scripted command list, and reports what was queued and dispatched.

use clap::Parser;

use cli::Args;

fn main() -> std::process::ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match cli::run(&args) {
        Ok(summary) => {
            tracing::info!(
                queued = summary.commands_queued,
                dispatched = summary.commands_dispatched,
                "run complete"
            );
            std::process::ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "run failed");
            std::process::ExitCode::FAILURE
        }
    }
}
