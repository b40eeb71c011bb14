pub mod aggregate;
pub mod config;
pub mod demand;
pub mod error;
pub mod insights;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod reference;
pub mod table;
