use crate::models::PriceQuote;
use crate::utils::{format_price, submission_price};

/// Zone and price ceiling for a new spot request.
#[derive(Clone, Debug, PartialEq)]
pub struct Bid {
    pub availability_zone: String,
    /// Spot price the ceiling was derived from.
    pub observed_price: f64,
    /// Ceiling sent to EC2, two decimals.
    pub spot_price: String,
}

/// Pick the zone to bid in and the price to bid.
///
/// `quotes` must be ordered cheapest first. Without an override the cheapest
/// zone is used. An override zone bids on its own quote when the table has
/// one, otherwise on the cheapest quote.
pub fn plan_bid(quotes: &[PriceQuote], zone_override: Option<&str>, premium_percent: u32) -> Option<Bid> {
    let cheapest = quotes.first()?;
    let zone = zone_override
        .map(str::trim)
        .filter(|z| !z.is_empty())
        .unwrap_or(&cheapest.availability_zone);
    let observed_price = quotes
        .iter()
        .find(|q| q.availability_zone == zone)
        .map(|q| q.price)
        .unwrap_or(cheapest.price);

    Some(Bid {
        availability_zone: zone.to_string(),
        observed_price,
        spot_price: format_price(submission_price(observed_price, premium_percent)),
    })
}
