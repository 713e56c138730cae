//! Command-line interface.
//!
//! Subcommands drive an in-process orchestrator directly; running with no
//! subcommand starts the HTTP service.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio::time::Duration;

use crate::audio::{CaptureBackend, CpalBackend};
use crate::config::Config;
use crate::global;
use crate::meeting::MeetingSessionOrchestrator;
use crate::persist::PersistenceLayer;

#[derive(Parser, Debug)]
#[command(name = "meetscribe")]
#[command(about = "Meeting transcription and summarization", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Record a meeting until Ctrl+C, then transcribe and summarize
    Record(RecordCliArgs),
    /// List available audio input devices
    Devices,
    /// List available engines or switch the active ones
    Engines(EnginesCliArgs),
    /// Show current engine status
    Status,
    /// Transcribe an audio file
    Transcribe(TranscribeCliArgs),
    /// Summarize text from a file
    Summarize(SummarizeCliArgs),
    /// Browse persisted meeting records
    Records(RecordsCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct RecordCliArgs {
    /// Meeting title
    #[arg(short, long)]
    pub title: Option<String>,
    /// Comma-separated list of participants
    #[arg(short, long)]
    pub participants: Option<String>,
    /// Audio input device index
    #[arg(short, long)]
    pub device: Option<usize>,
}

#[derive(ClapArgs, Debug)]
pub struct EnginesCliArgs {
    /// STT engine to switch to
    #[arg(long)]
    pub stt: Option<String>,
    /// Summarization engine to switch to
    #[arg(long)]
    pub summarization: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct TranscribeCliArgs {
    /// Audio file to transcribe
    pub file: PathBuf,
    /// STT engine to use instead of the configured default
    #[arg(long)]
    pub engine: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct SummarizeCliArgs {
    /// Text file to summarize
    pub file: PathBuf,
    /// Summarization engine to use instead of the configured default
    #[arg(long)]
    pub engine: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct RecordsCliArgs {
    /// Show the full record with this id
    #[arg(long)]
    pub id: Option<String>,
    /// Maximum number of records to list
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

fn build_persistence() -> Result<Arc<PersistenceLayer>> {
    Ok(Arc::new(PersistenceLayer::new(
        global::meetings_dir()?,
        global::db_file()?,
    )?))
}

async fn build_orchestrator(config: &Config) -> Result<MeetingSessionOrchestrator> {
    let persist = build_persistence()?;
    let backend = Arc::new(CpalBackend::new());
    Ok(MeetingSessionOrchestrator::new(config, backend, persist).await)
}

pub async fn handle_record_command(args: RecordCliArgs) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(device) = args.device {
        config.audio.input_device = Some(device);
    }

    let participants: Vec<String> = args
        .participants
        .map(|list| {
            list.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut orchestrator = build_orchestrator(&config).await?;

    let start = orchestrator.start_meeting(args.title, participants).await?;
    println!("Meeting started: {} (id: {})", start.title, start.meeting_id);
    println!("Press Ctrl+C to stop recording");

    let status = orchestrator.status_handle();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping recording...");
                break;
            }
            _ = status.limit_reached() => {
                println!("\nMaximum meeting duration reached, stopping...");
                break;
            }
            _ = ticker.tick() => {
                let snapshot = status.snapshot().await;
                if let Some(duration) = snapshot.duration_seconds {
                    print!(
                        "\rRecording {:02}:{:02} | live transcript: {} chars",
                        duration / 60,
                        duration % 60,
                        snapshot.transcript_length
                    );
                    let _ = std::io::stdout().flush();
                }
            }
        }
    }

    println!("Processing meeting...");
    let outcome = orchestrator.stop_meeting().await?;

    println!("Meeting saved successfully!");
    println!("Meeting ID: {}", outcome.meeting_id);
    println!("Audio file: {}", outcome.audio_file.display());
    println!("Meeting file: {}", outcome.meeting_file.display());

    if let Some(warning) = &outcome.warning {
        println!("Warning: {warning}");
    }

    if let Some(summary) = &outcome.summary {
        println!("\n--- Summary ---\n{}", summary.summary);

        if !summary.key_points.is_empty() {
            println!("\nKey Points:");
            for point in &summary.key_points {
                println!("  - {point}");
            }
        }

        if !summary.action_items.is_empty() {
            println!("\nAction Items:");
            for item in &summary.action_items {
                println!("  - {item}");
            }
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

pub fn handle_devices_command() -> Result<()> {
    let backend = CpalBackend::new();
    let devices = backend.list_input_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    println!("Available audio input devices:");
    for device in devices {
        println!(
            "  [{}] {} ({} Hz)",
            device.index, device.name, device.sample_rate
        );
    }
    Ok(())
}

pub async fn handle_engines_command(args: EnginesCliArgs) -> Result<()> {
    let config = Config::load()?;
    let mut orchestrator = build_orchestrator(&config).await?;

    if let Some(name) = &args.stt {
        if orchestrator.switch_stt_engine(name).await {
            println!("Switched to STT engine: {name}");
        } else {
            println!("Failed to switch to STT engine: {name}");
        }
    }

    if let Some(name) = &args.summarization {
        if orchestrator.switch_summarization_engine(name).await {
            println!("Switched to summarization engine: {name}");
        } else {
            println!("Failed to switch to summarization engine: {name}");
        }
    }

    if args.stt.is_none() && args.summarization.is_none() {
        println!("Available STT engines:");
        for engine in orchestrator.list_stt_engines() {
            println!("  - {engine}");
        }
        println!("\nAvailable summarization engines:");
        for engine in orchestrator.list_summarization_engines() {
            println!("  - {engine}");
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

pub async fn handle_status_command() -> Result<()> {
    let config = Config::load()?;
    let mut orchestrator = build_orchestrator(&config).await?;
    let status = orchestrator.engine_status().await;

    println!("STT engine:");
    println!("  Engine: {}", status.stt.name.as_deref().unwrap_or("none"));
    println!("  Initialized: {}", status.stt.initialized);

    println!("Summarization engine:");
    println!(
        "  Engine: {}",
        status.summarization.name.as_deref().unwrap_or("none")
    );
    println!("  Initialized: {}", status.summarization.initialized);

    orchestrator.shutdown().await;
    Ok(())
}

pub async fn handle_transcribe_command(args: TranscribeCliArgs) -> Result<()> {
    if !args.file.exists() {
        bail!("audio file not found: {}", args.file.display());
    }

    let config = Config::load()?;
    let mut orchestrator = build_orchestrator(&config).await?;

    if let Some(engine) = &args.engine {
        if !orchestrator.switch_stt_engine(engine).await {
            orchestrator.shutdown().await;
            bail!("failed to switch to STT engine: {engine}");
        }
    }

    println!("Transcribing: {}", args.file.display());
    let result = orchestrator.transcribe_file(&args.file).await?;

    println!("\n--- Transcription ---\n{}", result.text);
    if result.confidence > 0.0 {
        println!("\nConfidence: {:.2}", result.confidence);
    }
    if let Some(language) = &result.language {
        println!("Language: {language}");
    }

    orchestrator.shutdown().await;
    Ok(())
}

pub async fn handle_summarize_command(args: SummarizeCliArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let config = Config::load()?;
    let mut orchestrator = build_orchestrator(&config).await?;

    if let Some(engine) = &args.engine {
        if !orchestrator.switch_summarization_engine(engine).await {
            orchestrator.shutdown().await;
            bail!("failed to switch to summarization engine: {engine}");
        }
    }

    println!("Summarizing: {}", args.file.display());
    let summary = orchestrator.summarize_text(&text).await?;

    println!("\n--- Summary ---\n{}", summary.summary);

    if !summary.key_points.is_empty() {
        println!("\nKey Points:");
        for point in &summary.key_points {
            println!("  - {point}");
        }
    }

    if !summary.action_items.is_empty() {
        println!("\nAction Items:");
        for item in &summary.action_items {
            println!("  - {item}");
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

pub fn handle_records_command(args: RecordsCliArgs) -> Result<()> {
    let persist = build_persistence()?;

    if let Some(id) = &args.id {
        let Some(record) = persist.read_meeting_record(id)? else {
            bail!("meeting record not found: {id}");
        };

        println!("Meeting: {} ({})", record.title, record.id);
        if !record.participants.is_empty() {
            println!("Participants: {}", record.participants.join(", "));
        }
        println!(
            "Duration: {:02}:{:02}",
            record.duration_seconds / 60,
            record.duration_seconds % 60
        );
        println!("Audio: {}", record.audio_file.display());
        println!("\n--- Transcript ---\n{}", record.transcript);

        if let Some(summary) = &record.summary {
            println!("\n--- Summary ---\n{summary}");
        }
        return Ok(());
    }

    let entries = persist.list_meeting_records(args.limit)?;
    if entries.is_empty() {
        println!("No meetings recorded yet.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{} | {} | {:02}:{:02} | {}",
            entry.id,
            entry.title,
            entry.duration_seconds / 60,
            entry.duration_seconds % 60,
            entry.created_at
        );
    }
    println!("\nTo view a record: meetscribe records --id <ID>");

    Ok(())
}
