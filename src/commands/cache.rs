use anyhow::Result;
use colored::Colorize;
use setup_release::cache::{self, DirectoryStore};
use std::path::PathBuf;

pub fn cache(clean: bool, dir: Option<PathBuf>) -> Result<()> {
    let store = DirectoryStore::new(dir.unwrap_or_else(cache::default_cache_dir));

    if clean {
        println!("Cleaning tool cache...");

        if !store.root().exists() {
            println!("{} Cache is already empty", "✓".green());
            return Ok(());
        }

        // Calculate size before cleaning
        let total_size = store.size()?;
        let removed_count = store.clear()?;

        println!(
            "{} Removed {} entries, freed {}",
            "✓".green().bold(),
            removed_count.to_string().bold(),
            format_size(total_size).bold()
        );
    } else {
        println!("{}", "==> Tool Cache".bold().green());
        println!();

        println!(
            "{}: {}",
            "Location".bold(),
            store.root().display().to_string().cyan()
        );

        if !store.root().exists() {
            println!("{}: {}", "Status".bold(), "Empty".dimmed());
            println!("{}: {}", "Size".bold(), "0 bytes".dimmed());
            return Ok(());
        }

        let entries = store.entries()?;
        println!("{}: {}", "Entries".bold(), entries.len().to_string().cyan());
        println!("{}: {}", "Size".bold(), format_size(store.size()?).cyan());

        for entry in &entries {
            println!("  {}", entry.dimmed());
        }

        if !entries.is_empty() {
            println!();
            println!(
                "Run {} to clean the cache",
                "setup-release cache --clean".dimmed()
            );
        }
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
