use comfy_table::{modifiers, presets, ContentArrangement, Table};
use terminal_size::{terminal_size, Width};

use crate::models::{NetworkContext, PriceQuote};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    if let Some((Width(w), _)) = terminal_size() {
        table.set_width(w.saturating_sub(4));
    }
    table
}

pub fn price_table(quotes: &[PriceQuote]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["", "AvailabilityZone", "SpotPrice", "ProductDescription", "Timestamp"]);
    for (idx, q) in quotes.iter().enumerate() {
        table.add_row(vec![
            idx.to_string(),
            q.availability_zone.clone(),
            format!("{:.6}", q.price),
            q.product_description.clone(),
            q.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]);
    }
    table
}

pub fn network_table(network: &NetworkContext) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["VPC".to_string(), network.vpc_id.clone()]);
    table.add_row(vec!["Security group".to_string(), network.security_group_id.clone()]);
    for (zone, subnet) in &network.subnets {
        table.add_row(vec![format!("Subnet {}", zone), subnet.clone()]);
    }
    table
}

pub fn print_price_table(quotes: &[PriceQuote]) {
    if quotes.is_empty() {
        println!("(empty list)");
        return;
    }
    println!("\n{}\n", price_table(quotes));
}
