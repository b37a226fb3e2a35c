//! User synchronisation with the remote tracker

pub mod ports;
pub mod service;

pub use service::UserSyncService;
