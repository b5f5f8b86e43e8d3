//! UniClipboard Share
//!
//! Keeps the clipboard of two machines in step and ships files between them.

pub mod bootstrap;
pub mod cli;
