//! Stats command - show database statistics.

use super::{format_size, get_database};
use anyhow::Result;
use colored::Colorize;

pub fn run() -> Result<()> {
    let db = get_database()?;
    let stats = db.get_stats()?;

    println!("{}", "Quarry Statistics".cyan().bold());
    println!("{}", "─".repeat(50));

    println!();
    println!("{}", "Corpus".white().bold());
    println!(
        "  Total documents: {}",
        stats.total_documents.to_string().green()
    );

    if !stats.documents_by_type.is_empty() {
        let mut by_type: Vec<_> = stats.documents_by_type.iter().collect();
        by_type.sort_by(|a, b| b.1.cmp(a.1));
        for (content_type, count) in by_type {
            println!("    {}: {}", content_type, count);
        }
    }

    if let Some(failed) = stats.documents_by_status.get("failed") {
        if *failed > 0 {
            println!("  Failed: {}", failed.to_string().red());
        }
    }

    println!();
    println!("{}", "Index".white().bold());
    println!("  Total chunks: {}", stats.total_chunks);
    println!("  Embeddings: {}", stats.total_embeddings);
    if stats.total_chunks > 0 && stats.total_embeddings < stats.total_chunks {
        println!(
            "  {} {} chunks have no embedding",
            "Note:".yellow(),
            stats.total_chunks - stats.total_embeddings
        );
    }

    println!();
    println!("{}", "Storage".white().bold());
    println!("  Database size: {}", format_size(stats.database_size_bytes));

    Ok(())
}
