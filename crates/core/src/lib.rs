//! # Tracklane Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Rate resolution (priority chain + precomputed lookup map)
//! - User synchronisation and workload aggregation services
//! - Port/adapter interfaces (traits)
//!
//! ## Architecture Principles
//! - Only depends on `tracklane-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod rates;
pub mod sync;
pub mod workload;

// Re-export specific items to avoid ambiguity
pub use rates::lookup::RateLookupMap;
pub use rates::ports::RateRepository;
pub use rates::RateService;
pub use sync::ports::{TrackerGateway, UserRepository};
pub use sync::UserSyncService;
pub use workload::WorkloadService;
