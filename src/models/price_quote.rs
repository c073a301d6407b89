use chrono::{DateTime, Utc};

/// One row of the spot price table.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceQuote {
    pub availability_zone: String,
    pub price: f64,
    pub product_description: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl PriceQuote {
    pub fn new(availability_zone: impl Into<String>, price: f64, product_description: impl Into<String>) -> Self {
        Self {
            availability_zone: availability_zone.into(),
            price,
            product_description: product_description.into(),
            timestamp: None,
        }
    }

    pub fn is_unix(&self) -> bool {
        self.product_description.contains("UNIX")
    }
}

/// Keep UNIX rows only and order them cheapest first.
///
/// Equal prices are ordered by zone so the table is stable between runs.
pub fn cheapest_unix_first(quotes: Vec<PriceQuote>) -> Vec<PriceQuote> {
    let mut rows: Vec<PriceQuote> = quotes.into_iter().filter(PriceQuote::is_unix).collect();
    rows.sort_by(|a, b| {
        a.price
            .total_cmp(&b.price)
            .then_with(|| a.availability_zone.cmp(&b.availability_zone))
    });
    rows
}
