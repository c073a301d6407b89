/// Case-insensitive substring match, used for subnet name tags.
pub fn name_contains(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(&needle.to_lowercase())
}

/// True when `name` contains every one of `needles` (case-sensitive, as
/// security group names are matched verbatim).
pub fn name_contains_all(name: &str, needles: &[String]) -> bool {
    needles.iter().all(|n| name.contains(n.as_str()))
}
