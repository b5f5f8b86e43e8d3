//! Process startup: config, logging, wiring and task supervision.

pub mod config;
mod run;
pub mod tracing;
pub mod wiring;

pub use run::{fetch_clipboard, fetch_file, run, send_file, serve};
