//! Recent command - list recently ingested documents.

use super::{get_database, truncate};
use anyhow::Result;
use colored::Colorize;

pub fn run(limit: i64) -> Result<()> {
    let db = get_database()?;

    let docs = db.list_recent_documents(limit)?;

    if docs.is_empty() {
        println!(
            "{}",
            "No documents found. Use 'quarry ingest <path>' to add content.".dimmed()
        );
        return Ok(());
    }

    println!("{}", "Recent Documents".cyan().bold());
    println!("{}", "─".repeat(70));

    for doc in docs {
        let date = doc.created_at.format("%Y-%m-%d %H:%M").to_string();

        println!(
            "{} {} {} {}",
            doc.content_type.as_str().cyan(),
            doc.filename.white().bold(),
            format!("[{}]", doc.id.chars().take(8).collect::<String>()).dimmed(),
            date.dimmed()
        );
        println!(
            "  {} {}",
            format!("{} chunks", doc.chunk_count).dimmed(),
            truncate(&doc.source_path, 60).dimmed()
        );
    }

    Ok(())
}
