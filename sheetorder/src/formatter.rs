//! Output formatters for orders, history and configuration

use anyhow::Result;
use colored::*;
use sheetorder_core::{ConfigStore, HistoryEntry, OrderCreated};
use std::path::Path;

/// Confirmation after an order was written
pub fn print_created(created: &OrderCreated) {
    println!("{}", "✓ Order created successfully!".green().bold());
    println!();
    println!("  {} {}", "Number:".bold(), created.order_number.cyan().bold());
    println!("  {} {}", "Department:".bold(), created.department);
    println!("  {} {}", "File:".bold(), created.file_name);
    println!("  {} {}", "Path:".bold(), created.path.display().to_string().bright_black());
}

/// What `create --dry-run` would do
pub fn print_dry_run(order_number: &str, department: &str, target: &Path, template: &Path) {
    println!("{}", "[DRY RUN] Order preview:".bold());
    println!("  {} {}", "Number:".bold(), order_number.cyan().bold());
    println!("  {} {}", "Department:".bold(), department);
    println!("  {} {}", "Template:".bold(), template.display());
    println!("\nOutput would be: {}", target.display());
}

/// History, most recent first, with the index `history open` expects
pub fn print_history(entries: &[HistoryEntry], limit: Option<usize>) {
    if entries.is_empty() {
        println!("{}", "No orders created yet.".bright_black());
        return;
    }

    println!("{}", "History:".bold().underline());
    let shown = limit.unwrap_or(entries.len());
    for (index, entry) in entries.iter().rev().enumerate().take(shown) {
        let missing = if Path::new(&entry.file_path).exists() {
            "".normal()
        } else {
            " (missing)".red()
        };
        println!(
            "  {:>3}  {} - {}/{}{}",
            (index + 1).to_string().bright_black(),
            entry.file_name().cyan(),
            entry.folder,
            entry.department,
            missing
        );
    }
}

/// History in JSON format, most recent first
pub fn print_history_json(entries: &[HistoryEntry], limit: Option<usize>) -> Result<()> {
    let shown = limit.unwrap_or(entries.len());
    let recent: Vec<_> = entries.iter().rev().take(shown).collect();
    println!("{}", serde_json::to_string_pretty(&recent)?);
    Ok(())
}

/// Summary of the well-known configuration values
pub fn print_config(store: &ConfigStore) {
    fn or_unset(value: Option<String>) -> ColoredString {
        match value {
            Some(v) if !v.is_empty() => v.normal(),
            _ => "(not set)".bright_black(),
        }
    }

    println!("{} {}", "Configuration:".bold(), store.path().display());
    println!(
        "  {} {}",
        "Template:".bold(),
        or_unset(store.default_template_path().map(|p| p.display().to_string()))
    );
    println!(
        "  {} {}",
        "Last folder:".bold(),
        or_unset(store.last_folder().map(|p| p.display().to_string()))
    );
    println!(
        "  {} {}",
        "Last department:".bold(),
        or_unset(Some(store.last_department()))
    );
    println!(
        "  {} {}",
        "Theme:".bold(),
        if store.dark_theme() { "dark" } else { "light" }
    );
    println!("  {} {}", "History entries:".bold(), store.history().len());
}

/// The raw configuration record in JSON format
pub fn print_config_json(store: &ConfigStore) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(store.record())?);
    Ok(())
}
