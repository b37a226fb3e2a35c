//! Hourly-rate resolution and assignment

pub mod lookup;
pub mod ports;
pub mod service;

pub use lookup::RateLookupMap;
pub use service::RateService;
