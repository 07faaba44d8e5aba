// src/main.rs
mod utils;
mod extractors;
mod storage;

use std::path::PathBuf;
use clap::Parser;
use utils::AppError;
use extractors::FieldExtractor;
use storage::{OutputOptions, StorageManager, DEFAULT_OUTPUT_FILE};

/// Extract trade-lead records from a text file and save them as delimited rows.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file
    input_file: PathBuf,

    /// Path to the output CSV file
    #[arg(default_value = DEFAULT_OUTPUT_FILE)]
    output_file: PathBuf,

    /// Field delimiter for the output file (single ASCII character)
    #[arg(short, long, default_value_t = ';')]
    delimiter: char,

    /// Also write run metadata as JSON next to the output file
    #[arg(short, long)]
    metadata: bool,

    /// Debug mode - verbose logs and an annotated copy of the input showing field matches
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn output_options(&self) -> Result<OutputOptions, AppError> {
        let delimiter = u8::try_from(self.delimiter)
            .ok()
            .filter(|b| b.is_ascii() && !matches!(*b, b'"' | b'\n' | b'\r'))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Invalid delimiter {:?}: must be a single ASCII character",
                    self.delimiter
                ))
            })?;
        Ok(OutputOptions { delimiter })
    }
}

fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (RUST_LOG overrides; --debug lowers the default to DEBUG)
    utils::logging::setup_logging(if args.debug { "debug" } else { "info" });
    tracing::info!("Starting processing for args: {:?}", args);
    let options = args.output_options()?;

    // 3. Read the whole document; an unreadable input aborts before any output is written
    let storage = StorageManager::new(options);
    let document = storage.read_document(&args.input_file)?;

    // 4. Extract records
    let extractor = FieldExtractor::new();
    let extraction = extractor.extract(&document);

    if args.debug {
        let report_path = storage::debug_report_path(&args.output_file);
        if let Err(e) = utils::match_debug::save_match_report(&document, &extractor, &report_path) {
            tracing::warn!("Failed to create match debug report: {}", e);
        }
    }

    // 5. Save records
    let output_path = storage.save_records(&extraction.records, &args.output_file)?;

    if args.metadata {
        let columns = StorageManager::columns(&extraction.records);
        storage.save_run_metadata(&args.input_file, &output_path, &columns, &extraction.stats)?;
    }

    tracing::info!(
        "Processing finished. Blocks: {}, Records: {}, Skipped CAS matches: {}",
        extraction.stats.blocks,
        extraction.stats.records,
        extraction.stats.skipped_cas_matches
    );

    println!("Data has been extracted and saved to {}", output_path.display());
    Ok(())
}
