//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `quotevault_core` wiring:
//!   seed an in-memory vault and display one random quote.

use quotevault_core::{QuoteService, SqliteKeyValueStore};

fn main() {
    println!("quotevault_core version={}", quotevault_core::core_version());

    let storage = match SqliteKeyValueStore::open_in_memory() {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("storage open failed: {err}");
            std::process::exit(1);
        }
    };

    let mut service = match QuoteService::open(storage) {
        Ok(service) => service,
        Err(err) => {
            eprintln!("service open failed: {err}");
            std::process::exit(1);
        }
    };

    println!("quotes={}", service.quote_count());
    match service.random_quote() {
        Ok(Some(quote)) => println!("\"{}\" — {}", quote.text, quote.category),
        Ok(None) => println!("no quotes available for the current filter"),
        Err(err) => {
            eprintln!("selection failed: {err}");
            std::process::exit(1);
        }
    }
}
