//! Terminal output formatting for waymark's subcommands.
//! Uses comfy-table for tabular output and colored for
//! severity-aware terminal styling.

use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use waymark_core::{MigrationResult, MigrationStatus, MigrationType};

/// Format a migration status as a colored table of pending work.
pub fn print_status_table(status: &MigrationStatus) {
    println!(
        "Current version: {}",
        status.current_version.to_string().cyan().bold()
    );

    if !status.needs_migration {
        println!("{}", "Schema is up to date. No migration necessary.".green());
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Identity"),
            Cell::new("Type"),
            Cell::new("Version"),
        ]);

    for pending in &status.pending_migrations {
        table.add_row(vec![
            Cell::new(&pending.identity),
            Cell::new(format_type(pending.migration_type)),
            Cell::new(pending.version),
        ]);
    }

    println!("{table}");
    println!(
        "{}",
        format!("{} migration(s) pending.", status.pending_migrations.len()).yellow()
    );
}

/// Format the outcome of a run.
pub fn print_run_result(result: MigrationResult) {
    match result {
        MigrationResult::Success => {
            println!("{}", "Migrations applied successfully.".green().bold());
        }
        MigrationResult::Failed => {
            eprintln!("{}", "Migration run failed.".red().bold());
        }
    }
}

fn format_type(kind: MigrationType) -> String {
    match kind {
        MigrationType::Versioned => "Versioned".to_string(),
        MigrationType::VersionedAndResumable => "Resumable".cyan().to_string(),
        MigrationType::Repeatable => "Repeatable".dimmed().to_string(),
    }
}
