pub mod acquisition;
pub mod discovery;
pub mod pricing;
pub mod provisioner;

// Re-export commonly used items
pub use acquisition::{acquire, Acquisition, CAPACITY_NOT_AVAILABLE_NOTICE};
pub use discovery::{discover_network, exactly_one, public_subnets, select_security_group};
pub use pricing::{plan_bid, Bid};
pub use provisioner::Provisioner;
