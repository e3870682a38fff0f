//! Related command - find chunks similar to an existing chunk.

use super::{get_database, truncate};
use anyhow::{Context, Result};
use colored::Colorize;
use quarry_config::Config;
use quarry_ollama::OllamaClient;
use quarry_retrieval::RetrievalEngine;
use std::sync::Arc;
use tokio::runtime::Runtime;

pub fn run(chunk_id: &str, limit: usize) -> Result<()> {
    let db = get_database()?;
    let config = Config::load().context("Failed to load configuration")?;

    // Resolve before calling out to Ollama so bad IDs fail fast
    let chunk = db.get_chunk(&chunk_id.to_string())?;

    let client = Arc::new(
        OllamaClient::from_config(&config.ollama).context("Failed to create Ollama client")?,
    );

    let rt = Runtime::new().context("Failed to create async runtime")?;

    if !rt.block_on(client.is_available()) {
        anyhow::bail!(
            "Ollama is not running at {}. Start it with 'ollama serve'.",
            config.ollama.host
        );
    }

    println!(
        "{} {}",
        "Chunks related to:".cyan().bold(),
        truncate(&chunk.content, 80)
    );
    println!("{}", "─".repeat(70));

    let engine = RetrievalEngine::new(db, client);
    let matches = rt.block_on(engine.find_related(&chunk.id, limit))?;

    if matches.is_empty() {
        println!();
        println!("{}", "No related chunks found.".dimmed());
        return Ok(());
    }

    println!();
    for m in &matches {
        println!(
            "{} {} {}",
            "•".cyan(),
            m.filename.white().bold(),
            format!("[{}]", m.chunk.id.chars().take(8).collect::<String>()).dimmed()
        );
        println!("  {} {:.0}%", "Similarity:".dimmed(), m.similarity * 100.0);
        println!("  {}", truncate(&m.chunk.content, 150).dimmed());
        println!();
    }

    Ok(())
}
