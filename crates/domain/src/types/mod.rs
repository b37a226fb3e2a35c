//! Domain data types
//!
//! Submodules group types by the part of the system they belong to.

pub mod rate;
pub mod tracker;
pub mod user;

pub use rate::*;
pub use tracker::*;
pub use user::*;
