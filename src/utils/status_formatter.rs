/// Human readable label for a spot request status code.
pub fn format_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "pending-evaluation" => "Pending Evaluation".to_string(),
        "pending-fulfillment" => "Pending Fulfillment".to_string(),
        "fulfilled" => "Fulfilled".to_string(),
        "capacity-not-available" => "Capacity Not Available".to_string(),
        "price-too-low" => "Price Too Low".to_string(),
        "request-canceled-and-instance-running" => "Canceled (instance running)".to_string(),
        "canceled-before-fulfillment" => "Canceled".to_string(),
        "instance-terminated-by-user" => "Instance Terminated".to_string(),
        "instance-stopped-by-price" | "instance-stopped-no-capacity" => "Instance Stopped".to_string(),
        _ => status.to_string(),
    }
}
