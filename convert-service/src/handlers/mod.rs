pub mod convert;
pub mod health;

pub use convert::convert_document;
pub use health::{health_check, metrics_endpoint, readiness_check};
