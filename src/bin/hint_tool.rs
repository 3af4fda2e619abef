//! bucketkv Hint Tool
//!
//! Inspect, verify and convert hint files.

use std::path::PathBuf;
use std::process;

use bucketkv::hint::{self, HintFile};
use bucketkv::{KvError, MemIndex, LiveIndex};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// bucketkv hint tool
#[derive(Parser, Debug)]
#[command(name = "bucketkv-hint")]
#[command(about = "Inspect and convert bucketkv hint files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every record of a hint file
    Dump {
        /// Hint file (".lz4" suffix means compressed)
        path: PathBuf,

        /// Bucket the file belongs to
        #[arg(short, long, default_value = "0")]
        bucket: u8,
    },

    /// Replay a hint file into an empty index and report counts
    Stat {
        path: PathBuf,

        #[arg(short, long, default_value = "0")]
        bucket: u8,
    },

    /// Report how much of a hint file is dead weight
    Audit {
        path: PathBuf,

        #[arg(short, long, default_value = "0")]
        bucket: u8,
    },

    /// Copy a hint file, converting its compression by destination name
    Convert {
        /// Source hint file
        src: PathBuf,

        /// Destination hint file
        dst: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bucketkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = execute(args.command) {
        if e.is_fatal() {
            tracing::error!("Fatal: {}", e);
        } else {
            tracing::error!("{}", e);
        }
        process::exit(1);
    }
}

fn execute(command: Commands) -> Result<(), KvError> {
    match command {
        Commands::Dump { path, bucket } => {
            let Some(file) = HintFile::open(&path)? else {
                println!("{}: no records", path.display());
                return Ok(());
            };
            for record in file.records(bucket) {
                match record {
                    Ok(entry) => println!(
                        "{}\tloc={:#010x}\tver={}\thash={:#06x}",
                        String::from_utf8_lossy(entry.key),
                        entry.locator.raw(),
                        entry.version,
                        entry.value_hash
                    ),
                    Err(e) => println!("# {}", e),
                }
            }
            file.close();
        }

        Commands::Stat { path, bucket } => {
            let index = MemIndex::new();
            match hint::replay_path(&path, None, bucket, &index)? {
                Some(summary) => {
                    println!("records:   {}", summary.records);
                    println!("upserts:   {}", summary.upserts);
                    println!("removals:  {}", summary.removals);
                    println!("live keys: {}", index.len());
                    if let Some(short) = summary.short_bytes {
                        println!("truncated: {} byte(s) missing", short);
                    }
                }
                None => println!("{}: no hint file", path.display()),
            }
        }

        Commands::Audit { path, bucket } => {
            let index = MemIndex::new();
            if hint::replay_path(&path, None, bucket, &index)?.is_none() {
                println!("{}: no hint file", path.display());
                return Ok(());
            }
            let report = hint::audit_path(&path, bucket, &index)?;
            println!("stale: {}/{} ({:.1}%)", report.deleted, report.total, report.stale_ratio() * 100.0);
        }

        Commands::Convert { src, dst } => {
            match HintFile::open_with_rewrite(&src, Some(&dst))? {
                Some(file) => {
                    println!("{} -> {} ({} bytes decoded)", src.display(), dst.display(), file.len());
                    file.close();
                }
                None => println!("{}: no hint file", src.display()),
            }
        }
    }
    Ok(())
}
