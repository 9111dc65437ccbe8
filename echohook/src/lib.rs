//! Echohook - shared-secret webhook receiver.
//!
//! This library backs the two Echohook binaries:
//! - `echohook`: the receiver, which checks a token header and echoes JSON back
//! - `echohook-provision`: installs nginx, systemd and certbot around it
//!
//! ## Architecture
//!
//! ```text
//! client → nginx (:80/:443) → echohook (127.0.0.1:PORT) under systemd
//! ```

pub mod config;
pub mod provision;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use provision::{ProvisionConfig, ProvisionError, Provisioner};
pub use web::AppState;
