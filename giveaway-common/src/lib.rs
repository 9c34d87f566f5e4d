//! # Giveaway Common Library
//!
//! Shared code for the giveaway engine crates:
//! - Error type and result alias
//! - TOML configuration loading and path resolution
//! - Draw audit events (DrawEvent enum + EventBus)
//! - Duration utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
