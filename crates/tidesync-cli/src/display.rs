//! Display utilities for the TideSync CLI

use console::style;
use std::time::Duration;
use tidesync_sync::{SyncReport, SyncSettings};

/// Display the outcome of a sync round
pub fn display_sync_report(settings: &SyncSettings, server_addr: &str, report: &SyncReport) {
    println!();
    println!(
        "{} {}",
        style("⟲").blue().bold(),
        style("Sync Summary").bold().underlined()
    );
    println!(
        "  Directory: {}",
        style(settings.contents_dir.display()).cyan()
    );
    println!("  Server: {}", style(server_addr).cyan());
    if report.initial {
        println!("  {}", style("First sync of this directory").yellow());
    }

    println!("  Uploaded: {}", style(report.uploaded).green());
    println!("  Changes pushed: {}", style(report.changes_pushed).green());
    println!(
        "  Deletions pushed: {}",
        style(report.deletions_pushed).green()
    );
    println!("  Received: {}", style(report.received).green());
    println!(
        "  Removed by server: {}",
        style(report.removed_by_server).yellow()
    );
    println!(
        "  Conflicts: {}",
        if report.conflicts > 0 {
            style(report.conflicts).red()
        } else {
            style(report.conflicts).green()
        }
    );
    println!("  Files tracked: {}", style(report.files_tracked).cyan());
    println!(
        "  Duration: {}",
        style(format_duration(report.duration)).blue()
    );

    if report.is_noop() {
        display_success("Already up to date");
    } else if report.conflicts > 0 {
        display_warning("Conflicts were resolved in favour of the server version");
    } else {
        display_success("Sync completed");
    }
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display a warning message with proper formatting
pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Display an error message on stderr
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), style(message).red());
}

/// Display a success message with proper formatting
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}
