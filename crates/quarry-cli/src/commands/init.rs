//! Initialize Quarry.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use quarry_config::Config;
use quarry_db::Database;

pub fn run() -> Result<()> {
    let paths = get_paths()?;

    if paths.is_initialized() {
        println!("{} Quarry is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Database: {}", paths.database_file.display());
        return Ok(());
    }

    println!("{}", "Initializing Quarry...".cyan().bold());

    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
    println!(
        "  {} Created config: {}",
        "✓".green(),
        paths.config_file.display()
    );

    let _db = Database::open(&paths.database_file).context("Failed to initialize database")?;
    println!(
        "  {} Created database: {}",
        "✓".green(),
        paths.database_file.display()
    );

    println!();
    println!("{}", "Quarry initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Review config: {}", "quarry config show".cyan());
    println!("  2. Ingest documents: {}", "quarry ingest ~/Documents/notes".cyan());
    println!("  3. Search: {}", "quarry search \"your query\"".cyan());

    Ok(())
}
