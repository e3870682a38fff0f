//! Ask command - retrieval-augmented question answering.

use super::get_database;
use anyhow::{Context, Result};
use colored::Colorize;
use quarry_config::Config;
use quarry_ollama::OllamaClient;
use quarry_retrieval::{RagOrchestrator, RetrievalEngine};
use std::sync::Arc;
use tokio::runtime::Runtime;

pub fn run(
    question: &str,
    model: Option<String>,
    max_tokens: Option<i32>,
    thinking: bool,
    show_sources: bool,
) -> Result<()> {
    let db = get_database()?;
    let config = Config::load().context("Failed to load configuration")?;

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

    let model = model.unwrap_or_else(|| config.ollama.model.clone());

    println!("{} {}", "Question:".cyan().bold(), question);
    println!("{}", "─".repeat(70));
    println!();

    let engine = RetrievalEngine::new(db, client.clone());
    let rag = RagOrchestrator::new(engine, client, config.rag.clone(), model);

    let response = rt
        .block_on(rag.ask(question, &[], max_tokens, thinking))
        .context("Failed to generate answer")?;

    if let Some(ref reasoning) = response.thinking {
        println!("{}", "Thinking:".magenta().bold());
        println!("{}", reasoning.dimmed());
        println!();
    }

    println!("{}", "Answer:".green().bold());
    println!();
    println!("{}", response.answer);
    println!();

    match response.retrieval {
        Some(info) if show_sources && !info.matches.is_empty() => {
            println!("{}", "─".repeat(70));
            println!("{}", "Sources:".cyan().bold());
            for (i, source) in info.matches.iter().enumerate() {
                println!(
                    "  {}. {} (similarity: {:.0}%)",
                    i + 1,
                    source.source.white(),
                    source.similarity * 100.0
                );
            }
        }
        Some(_) => {}
        None => {
            println!(
                "{}",
                "Answered without retrieved context.".dimmed()
            );
        }
    }

    Ok(())
}
