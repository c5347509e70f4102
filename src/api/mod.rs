mod dashboard;
mod resources;

pub use dashboard::{dashboard_stats, DashboardStats};
pub use resources::{ErpModule, Listing, Page, Resource, ResourceClient};
