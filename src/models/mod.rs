pub mod instance_view;
pub mod network_context;
pub mod price_quote;
pub mod reservation;
pub mod spot_request;
pub mod teardown;

pub use instance_view::InstanceView;
pub use network_context::{NetworkContext, SecurityGroupSummary, SubnetSummary, VpcSummary};
pub use price_quote::{cheapest_unix_first, PriceQuote};
pub use reservation::Reservation;
pub use spot_request::{Resolution, SpotRequestSpec, SpotRequestStatus, CANCELED_INSTANCE_RUNNING, CAPACITY_NOT_AVAILABLE};
pub use teardown::Teardown;
