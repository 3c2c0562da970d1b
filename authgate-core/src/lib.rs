//! Core token lifecycle engine for authgate

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use config::AuthConfig;
pub use error::*;
pub use types::*;
