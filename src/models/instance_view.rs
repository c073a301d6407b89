#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceView {
    pub id: String,
    pub state: Option<String>,
    /// Assigned asynchronously after launch; absent for a short while.
    pub public_ip: Option<String>,
}
