//! Remote tracker API integration
//!
//! Layers, bottom up: credential handling ([`auth`]), the generic paged
//! fetch engine ([`paging`]), and the typed gateway over tracker resources
//! ([`gateway`]).

pub mod auth;
pub mod gateway;
pub mod paging;
pub mod types;

pub use auth::{CredentialProvider, TokenCache, TrackerCredentials};
pub use gateway::TrackerApi;
pub use paging::{PagedClient, SupportedStrategies};
pub use types::{FetchStrategy, PageMeta, PageRequest};
