//! Ingest command implementation.

use super::get_database;
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use quarry_config::Config;
use quarry_ingest::{IngestOptions, IngestOutcome, IngestionPipeline};
use quarry_ollama::OllamaClient;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Ingest a single file or directory.
pub fn run(path: &str, recursive: bool, update: bool, dry_run: bool) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let db = get_database()?;

    let path = Path::new(path);
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    let client =
        Arc::new(OllamaClient::from_config(&config.ollama).context("Failed to create Ollama client")?);

    let pipeline = IngestionPipeline::new(db, client.clone(), &config).with_options(IngestOptions {
        skip_existing: config.ingest.skip_existing,
        update_existing: update || config.ingest.update_existing,
    });

    let files = if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        pipeline.collect_files(path, recursive)?
    };
    if files.is_empty() {
        println!("{}", "No supported files found.".yellow());
        return Ok(());
    }

    if dry_run {
        println!("{} {}", "Would ingest:".cyan(), path.display());
        for file in &files {
            println!("  {}", file.display());
        }
        println!();
        println!(
            "{}",
            format!("Dry run - {} files, nothing was ingested.", files.len()).cyan()
        );
        return Ok(());
    }

    let rt = Runtime::new().context("Failed to create async runtime")?;

    if !rt.block_on(client.is_available()) {
        anyhow::bail!(
            "Ollama is not running at {}. Start it with 'ollama serve'.",
            config.ollama.host
        );
    }

    if files.len() == 1 {
        let file = &files[0];
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message(format!("Ingesting {}", file.display()));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        match rt.block_on(pipeline.ingest_file(file))? {
            IngestOutcome::Processed(doc) => {
                pb.finish_with_message(format!(
                    "{} {} ({} chunks)",
                    "Ingested:".green().bold(),
                    doc.filename,
                    doc.chunk_count
                ));
                println!("  ID: {}", doc.id);
                println!("  Type: {}", doc.content_type.as_str());
            }
            IngestOutcome::Skipped => {
                pb.finish_with_message(format!(
                    "{} {} (already in the corpus)",
                    "Skipped:".yellow().bold(),
                    file.display()
                ));
            }
        }
        return Ok(());
    }

    println!("{} {} files", "Found:".cyan(), files.len());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut processed = 0;
    let mut skipped = 0;
    let mut failed = 0;
    let mut total_chunks: i64 = 0;

    for file in &files {
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        pb.set_message(filename.to_string());

        match rt.block_on(pipeline.ingest_file(file)) {
            Ok(IngestOutcome::Processed(doc)) => {
                processed += 1;
                total_chunks += doc.chunk_count;
            }
            Ok(IngestOutcome::Skipped) => skipped += 1,
            Err(e) => {
                failed += 1;
                pb.println(format!(
                    "{} {}: {}",
                    "Failed:".red().bold(),
                    file.display(),
                    e
                ));
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();

    println!(
        "\n{} {} files ({} chunks)",
        "Ingested:".green().bold(),
        processed,
        total_chunks
    );
    if skipped > 0 {
        println!(
            "{} {} files (already in the corpus)",
            "Skipped:".yellow().bold(),
            skipped
        );
    }
    if failed > 0 {
        println!("{} {} files", "Failed:".red().bold(), failed);
    }

    Ok(())
}
