//! fluxlsm CLI
//!
//! Inspect a data directory or run the strategy comparison demo.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use fluxlsm::compaction::{SizeTieredOptions, TimeWindowOptions};
use fluxlsm::{CompactionStrategy, Config, Engine, Record, SnowflakeId};
use tracing_subscriber::{fmt, EnvFilter};

const HOUR_MS: u64 = 3_600_000;

/// fluxlsm
#[derive(Parser, Debug)]
#[command(name = "fluxlsm")]
#[command(about = "LSM message store with size-tiered and time-window compaction")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./fluxlsm_data")]
    data_dir: PathBuf,

    /// Compaction strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::SizeTiered)]
    strategy: Strategy,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Strategy {
    SizeTiered,
    TimeWindow,
}

impl Strategy {
    fn build(self) -> CompactionStrategy {
        match self {
            Strategy::SizeTiered => CompactionStrategy::SizeTiered(SizeTieredOptions::default()),
            Strategy::TimeWindow => CompactionStrategy::TimeWindow(TimeWindowOptions {
                window_ms: HOUR_MS,
                ..Default::default()
            }),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the same workload under both strategies and compare them
    Demo {
        /// Messages to write
        #[arg(long, default_value = "10000")]
        messages: u64,

        /// Flush after this many messages
        #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
        flush_every: u64,

        /// Compaction rounds after the last flush
        #[arg(long, default_value = "3")]
        rounds: usize,
    },

    /// Show the registered segments
    Stats,

    /// Print one message
    Get {
        /// Snowflake id
        key: u64,
    },

    /// Run compaction until the strategy has nothing left to merge
    Compact,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fluxlsm=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("fluxlsm v{}", fluxlsm::VERSION);

    let result = match args.command {
        Commands::Demo {
            messages,
            flush_every,
            rounds,
        } => run_demo(&args.data_dir, messages, flush_every, rounds),
        Commands::Stats => open(&args).and_then(|engine| {
            print_segments(&engine);
            Ok(())
        }),
        Commands::Get { key } => open(&args).and_then(|engine| {
            let record = engine.read(key)?;
            println!(
                "id={} channel={} author={} created_at={} content={}",
                record.id,
                record.channel_id,
                record.author_id,
                record.created_at,
                record.content_str().unwrap_or("<binary>")
            );
            Ok(())
        }),
        Commands::Compact => open(&args).and_then(|engine| {
            loop {
                let report = engine.compact()?;
                if report.is_noop() {
                    break;
                }
                println!(
                    "merged {} -> {} segments ({} records dropped)",
                    report.input_segments,
                    report.output_segments,
                    report.records_dropped()
                );
            }
            print_segments(&engine);
            println!("{}", engine.metrics().report());
            Ok(())
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn open(args: &Args) -> fluxlsm::Result<Engine> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .compaction_strategy(args.strategy.build())
        .build();
    Engine::open(config)
}

fn print_segments(engine: &Engine) {
    println!("{:>8} {:>6} {:>4} {:>10} {:>10}", "id", "seq", "gen", "records", "bytes");
    for meta in engine.segments() {
        println!(
            "{:>8} {:>6} {:>4} {:>10} {:>10}",
            meta.id, meta.seq, meta.generation, meta.record_count, meta.byte_size
        );
    }
}

/// Same message stream into one engine per strategy
///
/// Messages span several hours so that time windows age out, and one in ten
/// messages is an edit of an earlier one.
fn run_demo(root: &Path, messages: u64, flush_every: u64, rounds: usize) -> fluxlsm::Result<()> {
    let start_ms = fluxlsm::record::EPOCH_MS + 30 * 24 * HOUR_MS;
    let step_ms = (10 * HOUR_MS / messages.max(1)).max(1);

    for strategy in [Strategy::SizeTiered, Strategy::TimeWindow] {
        let dir = root.join(format!("demo-{:?}", strategy).to_lowercase());
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        let engine = Engine::open(
            Config::builder()
                .data_dir(&dir)
                .compaction_strategy(strategy.build())
                .build(),
        )?;

        let mut ids = Vec::with_capacity(messages as usize);
        for i in 0..messages {
            let ts = start_ms + i * step_ms;
            let id = if i % 10 == 9 {
                ids[(i / 2) as usize]
            } else {
                SnowflakeId::from_parts(ts, 1, (i % 4096) as u16).value()
            };
            ids.push(id);
            engine.write(Record::new(
                id,
                i % 8,
                i % 100,
                format!("message {} in channel {}", i, i % 8),
                ts,
            ))?;
            if (i + 1) % flush_every == 0 {
                engine.flush()?;
            }
        }
        engine.flush()?;

        let before = engine.sstable_count();
        for _ in 0..rounds {
            engine.compact()?;
        }

        println!("== {} ==", engine.config().compaction_strategy.name());
        println!("segments: {} -> {}", before, engine.sstable_count());
        println!("{}", engine.metrics().report());
        println!();
        engine.close()?;
    }
    Ok(())
}
