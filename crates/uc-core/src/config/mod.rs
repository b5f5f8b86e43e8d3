//! # Configuration data
//!
//! Plain data structures mapped from the TOML config file. Missing keys fall
//! back to the `Default` of their section; no other policy lives here.

mod app_config;

pub use app_config::{
    AppConfig, IdentityConfig, PeerConfig, RetryConfig, ServerConfig, SyncConfig, TransferConfig,
};
