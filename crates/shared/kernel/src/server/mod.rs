//! System routes shared by every deployment.

mod health;
pub mod router;

pub use health::HealthResponse;
