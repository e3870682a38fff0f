//! Show command - display document details.

use super::{format_size, get_database, truncate};
use anyhow::Result;
use colored::Colorize;

pub fn run(id: &str) -> Result<()> {
    let db = get_database()?;

    let doc = db.get_document(&id.to_string())?;

    println!("{}", doc.filename.white().bold());
    println!("{}", "─".repeat(70));

    println!("  {}: {}", "ID".cyan(), doc.id);
    println!("  {}: {}", "Type".cyan(), doc.content_type.as_str());
    println!("  {}: {}", "Status".cyan(), doc.status.as_str());
    println!("  {}: {}", "Source".cyan(), doc.source_path);
    println!("  {}: {}", "Hash".cyan(), doc.content_hash);
    println!("  {}: {}", "Size".cyan(), format_size(doc.file_size));
    println!(
        "  {}: {}",
        "Created".cyan(),
        doc.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(processed) = doc.processed_at {
        println!(
            "  {}: {}",
            "Processed".cyan(),
            processed.format("%Y-%m-%d %H:%M:%S")
        );
    }

    let chunks = db.get_chunks_by_document(&doc.id)?;
    if !chunks.is_empty() {
        println!();
        println!(
            "{} ({} chunks)",
            "Content Preview".white().bold(),
            chunks.len()
        );
        println!("{}", "─".repeat(70));

        for chunk in chunks.iter().take(3) {
            if let Some(ref heading) = chunk.heading {
                println!("[{}]", heading.cyan());
            }
            println!("{}", truncate(&chunk.content, 200).dimmed());
            println!();
        }

        if chunks.len() > 3 {
            println!(
                "{}",
                format!("... and {} more chunks", chunks.len() - 3).dimmed()
            );
        }
    }

    if !doc.metadata.is_null() && doc.metadata != serde_json::json!({}) {
        println!();
        println!("{}", "Metadata".white().bold());
        println!("{}", "─".repeat(70));
        println!("{}", serde_json::to_string_pretty(&doc.metadata)?.dimmed());
    }

    Ok(())
}
