//! Terminal output for the CLI
//!
//! The per-tick throughput lines go through `tracing`; this module only
//! prints the banner before the scan and the summary after it.

use crate::scanner::ScanSummary;
use console::style;
use humansize::{format_size, BINARY};

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print a banner at the start of the scan
pub fn print_header(source: &str, workers: usize, buffer_size: usize, objects: usize, total_size: u64) {
    let buffer = if buffer_size == 0 {
        "unbuffered".to_string()
    } else {
        format_size(buffer_size, BINARY)
    };

    println!();
    println!(
        "{} {}",
        style("avro-bandwidth").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), source);
    println!(
        "  {} {} ({})",
        style("Objects:").bold(),
        format_number(objects as u64),
        format_size(total_size, BINARY)
    );
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Buffer:").bold(), buffer);
    println!();
}

/// Print the results of a finished scan
pub fn print_summary(summary: &ScanSummary) {
    println!();
    println!("{}", style("Scan Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Records:").bold(), format_number(summary.records));
    println!(
        "  {} {}",
        style("Objects:").bold(),
        format_number(summary.objects_completed)
    );
    if summary.objects_abandoned > 0 {
        println!(
            "  {} {}",
            style("Abandoned:").yellow().bold(),
            format_number(summary.objects_abandoned)
        );
    }
    println!(
        "  {} {}",
        style("Bytes read:").bold(),
        format_size(summary.bytes, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.0} records/sec, {}/s)",
        style("Duration:").bold(),
        summary.duration.as_secs_f64(),
        summary.records_per_second(),
        format_size(summary.bytes_per_second() as u64, BINARY)
    );
    if let Some(rate) = summary.smoothed_rate {
        println!("  {} {:.0} records/sec", style("Smoothed:").bold(), rate);
    }
    println!();
}
