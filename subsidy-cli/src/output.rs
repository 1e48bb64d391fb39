//! Output Formatting
//!
//! Utilities for formatting CLI output in various formats.

use crate::commands::OutputFormat;
use serde::Serialize;
use subsidy_api::{HealthResponse, PaginatedResponse, SubsidyResponse, TransactionResponse};
use subsidy_core::ContentMetadata;

/// Print as JSON
fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

/// Print health response
pub fn print_health(health: &HealthResponse, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(health),
        OutputFormat::Plain => println!("{}", health.status),
        OutputFormat::Table => {
            println!("Subsidy Service Health");
            println!("======================");
            println!("Status:   {}", health.status);
            println!("Version:  {}", health.version);
            println!("Uptime:   {}s", health.uptime_secs);
            println!("Requests: {}", health.requests_served);
            println!();
            println!("Components:");
            for component in &health.components {
                print!("  - {}: {}", component.name, component.status);
                if let Some(msg) = &component.message {
                    print!(" ({})", msg);
                }
                println!();
            }
        }
    }
}

/// Print one subsidy
pub fn print_subsidy(subsidy: &SubsidyResponse, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(subsidy),
        OutputFormat::Plain => println!("{} {} {}", subsidy.uuid, subsidy.current_balance, subsidy.unit),
        OutputFormat::Table => {
            println!("Subsidy");
            println!("=======");
            print_row("UUID", &subsidy.uuid.to_string());
            print_row("Title", &subsidy.title);
            print_row("Enterprise", &subsidy.enterprise_customer_uuid.to_string());
            print_row("Active", &subsidy.active_datetime);
            print_row("Expires", &subsidy.expiration_datetime);
            print_row("Unit", subsidy.unit.as_str());
            print_row("Balance", &subsidy.current_balance.to_string());
            if let (Some(id), Some(kind)) = (&subsidy.reference_id, &subsidy.reference_type) {
                print_row("Reference", &format!("{} ({})", id, kind));
            }
        }
    }
}

/// Print a page of subsidies
pub fn print_subsidies(page: &PaginatedResponse<SubsidyResponse>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(page),
        OutputFormat::Plain => {
            for subsidy in &page.items {
                println!("{} {} {}", subsidy.uuid, subsidy.current_balance, subsidy.unit);
            }
        }
        OutputFormat::Table => {
            println!("{:<38} {:>14} {:<10} {}", "UUID", "BALANCE", "UNIT", "TITLE");
            print_separator();
            for subsidy in &page.items {
                println!(
                    "{:<38} {:>14} {:<10} {}",
                    subsidy.uuid, subsidy.current_balance, subsidy.unit, subsidy.title
                );
            }
            print_page_footer(page);
        }
    }
}

/// Print one transaction
pub fn print_transaction(tx: &TransactionResponse, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(tx),
        OutputFormat::Plain => println!("{} {} {}", tx.uuid, tx.state, tx.quantity),
        OutputFormat::Table => {
            println!("Transaction");
            println!("===========");
            print_row("UUID", &tx.uuid.to_string());
            print_row("State", &tx.state);
            print_row("Quantity", &format!("{} {}", tx.quantity, tx.unit));
            print_row("Ledger", &tx.ledger.to_string());
            print_row("Idempotency Key", &tx.idempotency_key);
            if let Some(learner) = tx.lms_user_id {
                print_row("Learner", &learner.to_string());
            }
            if let Some(content_key) = &tx.content_key {
                print_row("Content", content_key);
            }
            if let Some(reference_id) = &tx.reference_id {
                print_row("Reference", reference_id);
            }
            print_row("Created", &tx.created.to_rfc3339());
            if let Some(reversal) = &tx.reversal {
                println!();
                println!("Reversal:");
                print_row("  UUID", &reversal.uuid.to_string());
                print_row("  Quantity", &reversal.quantity.to_string());
                print_row("  State", &reversal.state);
            }
        }
    }
}

/// Print a page of transactions
pub fn print_transactions(page: &PaginatedResponse<TransactionResponse>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(page),
        OutputFormat::Plain => {
            for tx in &page.items {
                println!("{} {} {}", tx.uuid, tx.state, tx.quantity);
            }
        }
        OutputFormat::Table => {
            println!("{:<38} {:<10} {:>12} {:<10} {}", "UUID", "STATE", "QUANTITY", "LEARNER", "CONTENT");
            print_separator();
            for tx in &page.items {
                println!(
                    "{:<38} {:<10} {:>12} {:<10} {}",
                    tx.uuid,
                    tx.state,
                    tx.quantity,
                    tx.lms_user_id.map(|id| id.to_string()).unwrap_or_default(),
                    tx.content_key.as_deref().unwrap_or("-"),
                );
            }
            print_page_footer(page);
        }
    }
}

/// Print content metadata
pub fn print_metadata(metadata: &ContentMetadata, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(metadata),
        OutputFormat::Plain => println!("{} {}", metadata.content_key, metadata.content_price),
        OutputFormat::Table => {
            print_row("Content Key", &metadata.content_key);
            print_row("Content UUID", &metadata.content_uuid.to_string());
            print_row("Source", &metadata.source);
            print_row("Price", &metadata.content_price.to_string());
        }
    }
}

fn print_page_footer<T>(page: &PaginatedResponse<T>) {
    print_separator();
    let more = if page.has_more { ", more available" } else { "" };
    println!("page {} ({} of {} total{})", page.page, page.items.len(), page.total, more);
}

/// Print a table row
pub fn print_row(key: &str, value: &str) {
    println!("{:<20} {}", key, value);
}

/// Print a separator line
pub fn print_separator() {
    println!("{}", "-".repeat(80));
}
