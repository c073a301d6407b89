//! Acquire a low-cost EC2 spot instance: find the cheapest availability
//! zone, place a persistent spot request, wait for it to be fulfilled, tag
//! the instance and hand back its public address.

pub mod api;
pub mod config;
pub mod error;
pub mod menu;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{ConfigError, ProvisionError};
