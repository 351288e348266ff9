//! # airtouch-client
//!
//! Client library for the Airtouch2+ touchpad controller.
//!
//! This crate provides:
//! - Async TCP connection with an incremental framing read loop
//! - Scheduled AC and group status polling
//! - Reconnect after transport errors, de-duplicated across error events
//! - Subscription to decoded AC and group status
//! - High-level API for AC and zone commands
//! - YAML and environment configuration

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;

pub use client::Client;
pub use config::{Config, ConfigError};
pub use connection::{Connection, ConnectionConfig, ConnectionState, ConnectionStats};
pub use error::ClientError;
pub use event::StatusEvent;
