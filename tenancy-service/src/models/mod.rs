pub mod dealership;
pub mod principal;
pub mod report;
pub mod tenant;
pub mod violation;

pub use dealership::{CreateDealershipRequest, Dealership, DealershipResponse};
pub use principal::Principal;
pub use report::{Report, ReportResponse};
pub use tenant::Tenant;
pub use violation::{ViolationRecord, ViolationResponse};
