use anyhow::Result;
use clap::Parser;
use meetscribe::{
    app,
    cli::{
        handle_devices_command, handle_engines_command, handle_record_command,
        handle_records_command, handle_status_command, handle_summarize_command,
        handle_transcribe_command, Cli, CliCommand,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("meetscribe {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::Record(args)) => handle_record_command(args).await,
        Some(CliCommand::Devices) => handle_devices_command(),
        Some(CliCommand::Engines(args)) => handle_engines_command(args).await,
        Some(CliCommand::Status) => handle_status_command().await,
        Some(CliCommand::Transcribe(args)) => handle_transcribe_command(args).await,
        Some(CliCommand::Summarize(args)) => handle_summarize_command(args).await,
        Some(CliCommand::Records(args)) => handle_records_command(args),
        None => app::run_service().await,
    }
}
