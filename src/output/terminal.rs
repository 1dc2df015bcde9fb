// Colored terminal output for cycle reports, previews and delivery history.
//
// main.rs delegates here for anything printed to stdout. Logs go through
// tracing; this is the human-facing summary.

use colored::Colorize;

use crate::ledger::models::Delivery;
use crate::pipeline::preview::{PreviewEntry, Verdict};
use crate::pipeline::CycleReport;

/// Print the outcome of one `ferry once` cycle.
pub fn display_cycle_report(report: &CycleReport) {
    println!("\n{}", "=== Cycle Report ===".bold());

    if let Some(error) = &report.extraction_error {
        println!("  {} listing fetch failed: {}", "!!".red().bold(), error);
        println!("  Nothing was delivered. The next cycle will try again.");
        return;
    }

    println!("  Fetched:            {}", report.fetched);
    println!("  Rejected by filter: {}", report.rejected);
    println!("  Already delivered:  {}", report.already_delivered);
    println!("  Delivered:          {}", report.delivered.to_string().green());

    if report.failed > 0 {
        println!("  Failed:             {}", report.failed.to_string().red());
    }
    if report.unpersisted > 0 {
        println!(
            "  {} {} deliveries were sent but not written to the ledger",
            "!".yellow().bold(),
            report.unpersisted
        );
    }
    if report.interrupted {
        println!("  {}", "Interrupted by shutdown".yellow());
    }
    println!();
}

/// Print what the next cycle would do with each post in the listing.
pub fn display_preview(entries: &[PreviewEntry]) {
    if entries.is_empty() {
        println!("The listing is empty.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Preview ({} posts) ===", entries.len()).bold()
    );
    println!();

    for entry in entries {
        let title = super::ellipsize(&entry.post.title, 70);
        let verdict = match &entry.verdict {
            Verdict::Deliver(destinations) => {
                format!("deliver -> {}", destinations.join(", ")).green()
            }
            Verdict::Rejected(rule) => format!("skip ({rule})").yellow(),
            Verdict::AlreadyDelivered => "already delivered".dimmed(),
        };
        println!("  {:>8}  {:<72} {}", entry.post.topic_id, title, verdict);
    }

    let first_deliverable = entries
        .iter()
        .find(|e| matches!(e.verdict, Verdict::Deliver(_)));
    if let Some(entry) = first_deliverable {
        println!("\n  {}", "Next message:".bold());
        println!("  {}", entry.message.title);
        for line in entry.message.body.lines() {
            println!("  {}", line.dimmed());
        }
    }
    println!();
}

/// Print the most recent deliveries, newest first.
pub fn display_recent_deliveries(deliveries: &[Delivery]) {
    if deliveries.is_empty() {
        println!("Recent deliveries: none yet");
        println!("  Run `ferry once` or `ferry run` to start relaying");
        return;
    }

    println!("Recent deliveries ({} most recent):", deliveries.len());
    for d in deliveries {
        println!(
            "  {:>8} -> {:<24} {}",
            d.topic_id,
            d.destination,
            d.delivered_at.format("%Y-%m-%d %H:%M UTC").to_string().dimmed()
        );
    }
}
