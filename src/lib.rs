pub mod cache;
pub mod config;
pub mod credentials;
pub mod enrich;
pub mod error;
pub mod inspection;
pub mod output;
pub mod places;
pub mod ratelimit;
pub mod scoring;
pub mod telemetry;
pub mod transport;
