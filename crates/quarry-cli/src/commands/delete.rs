//! Delete command - remove a document by content hash.

use super::get_database;
use anyhow::Result;
use colored::Colorize;

pub fn run(hash: &str) -> Result<()> {
    let db = get_database()?;

    if db.delete_document_by_hash(hash)? {
        println!(
            "{} Document with hash {} removed.",
            "✓".green(),
            hash.chars().take(12).collect::<String>().cyan()
        );
    } else {
        println!(
            "{} No document found with hash {}.",
            "Note:".yellow().bold(),
            hash
        );
    }

    Ok(())
}
