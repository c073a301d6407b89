// Pricing
pub mod price;

// Retry scheduling
pub mod backoff;

// Resource matching and payload helpers
pub mod name_filter;
pub mod user_data;

// Terminal output
pub mod status_formatter;
pub mod table;

// Re-export all utilities for convenient access
pub use backoff::Backoff;
pub use name_filter::{name_contains, name_contains_all};
pub use price::{format_price, parse_price, submission_price};
pub use status_formatter::format_status;
pub use table::{network_table, price_table, print_price_table};
pub use user_data::encode_user_data;
