pub mod types;
pub mod classification;

pub use types::{SchemaError, VulnFusionError};
pub use classification::ErrorClassification;
