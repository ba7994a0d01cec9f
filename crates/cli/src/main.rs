//! Binary entry point for the subtitle sync tool.

mod follow;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use follow::PlaybackClock;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use subsync_core::srt::{
    format_timestamp, parse_file_with, parse_reader_with, try_parse_timestamp, ParseOptions,
    Parsed, SubtitleEntry,
};
use subsync_core::sync::{find_active, refresh_active_flags};
use tracing::{info, trace, warn};
use tracing_subscriber::EnvFilter;

/// Command line options for the binary.
#[derive(Parser)]
#[command(about = "Parse SRT subtitles and find the one active at a playback position")]
struct Cli {
    /// Enable verbose debug and trace logs.
    #[arg(long, global = true)]
    debug: bool,

    /// Fail on malformed input instead of skipping it.
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every parsed subtitle.
    List {
        /// SRT file to read, or `-` for standard input.
        input: PathBuf,

        /// Print the entries as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the subtitle active at a position.
    At {
        /// SRT file to read, or `-` for standard input.
        input: PathBuf,

        /// Position as `HH:MM:SS,mmm` or milliseconds.
        #[arg(value_parser = parse_position)]
        position: Duration,

        /// List every subtitle with its active flag.
        #[arg(long)]
        all: bool,
    },
    /// Simulate playback and print the active subtitle as it changes.
    Follow {
        /// SRT file to read, or `-` for standard input.
        input: PathBuf,

        /// Position to start playing from.
        #[arg(long, value_parser = parse_position, default_value = "0")]
        from: Duration,

        /// Milliseconds between position updates.
        #[arg(long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(1..))]
        tick_ms: u64,

        /// Playback speed factor.
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
}

/// Application entry point which parses CLI args and performs actions.
/// This function initializes logging and delegates to the core library.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.debug {
        EnvFilter::default()
            .add_directive("subsync=trace".parse()?)
            .add_directive("subsync_core=trace".parse()?)
            .add_directive("info".parse()?)
    } else {
        EnvFilter::default()
            .add_directive("subsync=info".parse()?)
            .add_directive("subsync_core=info".parse()?)
            .add_directive("warn".parse()?)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let options = ParseOptions { strict: cli.strict };
    let mut out = io::stdout();
    match cli.command {
        Command::List { input, json } => {
            let entries = load(&input, &options)?;
            if json {
                serde_json::to_writer_pretty(&mut out, &entries)?;
                writeln!(out)?;
            } else {
                for entry in &entries {
                    print_entry(&mut out, entry)?;
                }
            }
        }
        Command::At {
            input,
            position,
            all,
        } => {
            let entries = load(&input, &options)?;
            if all {
                for entry in refresh_active_flags(&entries, position) {
                    print_entry(&mut out, &entry)?;
                }
            } else if let Some(entry) = find_active(&entries, position) {
                print_entry(&mut out, entry)?;
            } else {
                info!("no subtitle active at {}", format_timestamp(position));
            }
        }
        Command::Follow {
            input,
            from,
            tick_ms,
            speed,
        } => {
            let entries = load(&input, &options)?;
            let clock = PlaybackClock::start(from, speed)?;
            let changes =
                follow::follow(&entries, &clock, Duration::from_millis(tick_ms), &mut out).await?;
            info!("playback finished after {changes} subtitle changes");
        }
    }
    Ok(())
}

/// Read and parse `input`, logging what the lenient parser skipped.
fn load(input: &Path, options: &ParseOptions) -> Result<Vec<SubtitleEntry>> {
    trace!("load(input={}, strict={})", input.display(), options.strict);
    let Parsed { entries, report } = if input == Path::new("-") {
        parse_reader_with(io::stdin().lock(), options).context("Failed to read from stdin")?
    } else {
        parse_file_with(input, options)
            .with_context(|| format!("Failed to parse SRT file: '{}'", input.display()))?
    };
    if !report.is_clean() {
        info!(
            "skipped {} lines, {} malformed timestamps, {} incomplete blocks",
            report.skipped_lines, report.malformed_timestamps, report.dropped_blocks
        );
    }
    if entries.is_empty() {
        warn!("no subtitles found in '{}'", input.display());
    } else {
        info!("loaded {} subtitles", entries.len());
    }
    Ok(entries)
}

fn print_entry<W: Write>(out: &mut W, entry: &SubtitleEntry) -> io::Result<()> {
    writeln!(
        out,
        "{} {:>5}  {} --> {}  {}",
        if entry.is_active { '*' } else { ' ' },
        entry.index,
        format_timestamp(entry.start),
        format_timestamp(entry.end),
        entry.text.replace('\n', " / ")
    )
}

/// Accept either `HH:MM:SS,mmm` or a plain millisecond count.
fn parse_position(value: &str) -> Result<Duration, String> {
    if let Ok(ms) = value.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    try_parse_timestamp(value).map_err(|e| format!("invalid position '{value}': {e}"))
}
