/// Price ceiling for a new request: `price` plus `premium_percent`, rounded
/// up to the next cent.
///
/// The premium is applied as an integer multiplier so that e.g. `0.0834`
/// at 5% yields `ceil(8.757) / 100 = 0.09`.
pub fn submission_price(price: f64, premium_percent: u32) -> f64 {
    let multiplier = f64::from(100u32.saturating_add(premium_percent));
    (price * multiplier).ceil() / 100.0
}

/// Format a price the way EC2 expects it in a request: exactly two decimals.
pub fn format_price(price: f64) -> String {
    format!("{:.2}", price)
}

/// Parse a spot price string as returned by EC2 (e.g. `"0.083400"`).
pub fn parse_price(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| {
        let t = v.trim();
        if t.is_empty() {
            None
        } else {
            t.parse::<f64>().ok().filter(|p| p.is_finite() && *p >= 0.0)
        }
    })
}
