//! Workload aggregation for billing reports

pub mod service;

pub use service::WorkloadService;
