//! Search command - semantic search over the corpus.

use super::{get_database, truncate};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use colored::Colorize;
use quarry_config::Config;
use quarry_core::{ContentType, DocumentMatch, SearchQuery};
use quarry_ollama::OllamaClient;
use quarry_retrieval::RetrievalEngine;
use std::sync::Arc;
use tokio::runtime::Runtime;

#[allow(clippy::too_many_arguments)]
pub fn run(
    query: &str,
    limit: usize,
    min_score: Option<f32>,
    content_type: Option<String>,
    document: Option<String>,
    days: Option<i64>,
    context: usize,
) -> Result<()> {
    let db = get_database()?;
    let config = Config::load().context("Failed to load configuration")?;

    let content_type_filter = match content_type.as_deref() {
        Some(raw) => Some(
            ContentType::from_str(raw)
                .ok_or_else(|| anyhow::anyhow!("Unknown content type: {}", raw))?,
        ),
        None => None,
    };

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

    let mut search_query = SearchQuery::new(query).with_max_results(limit);
    if let Some(min_score) = min_score {
        search_query = search_query.with_min_similarity(min_score);
    }
    if let Some(ct) = content_type_filter {
        search_query = search_query.with_content_types(vec![ct]);
    }
    if let Some(id) = document {
        search_query = search_query.in_documents(vec![id]);
    }
    if let Some(days) = days {
        let now = Utc::now();
        search_query = search_query.with_date_range(now - Duration::days(days), now);
    }

    println!("{} \"{}\"", "Searching for:".cyan().bold(), query);
    println!("{}", "─".repeat(70));

    let engine = RetrievalEngine::new(db, client);

    if context > 0 {
        let matches = rt.block_on(engine.search_with_context(&search_query, context))?;

        if matches.is_empty() {
            print_no_results();
            return Ok(());
        }

        println!();
        println!(
            "Found {} result{}",
            matches.len().to_string().green(),
            if matches.len() == 1 { "" } else { "s" }
        );
        println!();

        for contextual in &matches {
            print_match(&contextual.matched);
            for chunk in &contextual.surrounding {
                println!(
                    "    {} {}",
                    format!("[{}]", chunk.chunk_index).dimmed(),
                    truncate(&chunk.content, 120).dimmed()
                );
            }
            println!();
        }
        return Ok(());
    }

    let result = rt.block_on(engine.search(&search_query))?;

    if !result.has_results() {
        print_no_results();
        return Ok(());
    }

    println!();
    println!(
        "Found {} result{} in {:.0}ms",
        result.total_matches.to_string().green(),
        if result.total_matches == 1 { "" } else { "s" },
        result.search_time_ms + result.embedding_time_ms
    );
    println!();

    for m in &result.matches {
        print_match(m);
        println!();
    }

    Ok(())
}

fn print_no_results() {
    println!();
    println!("{}", "No similar content found.".dimmed());
    println!();
    println!("Tips:");
    println!("  • Try rephrasing your query");
    println!("  • Lower the similarity floor with {}", "--min-score".cyan());
    println!("  • Make sure content has been ingested");
}

fn print_match(m: &DocumentMatch) {
    println!(
        "{} {} {}",
        "•".cyan(),
        m.filename.white().bold(),
        format!("[{}]", m.chunk.id.chars().take(8).collect::<String>()).dimmed()
    );
    println!("  {} {:.0}%", "Similarity:".dimmed(), m.similarity * 100.0);
    if let Some(ref heading) = m.chunk.heading {
        println!("  {} {}", "Section:".dimmed(), heading);
    }
    println!("  {}", truncate(&m.chunk.content, 150).dimmed());
}
