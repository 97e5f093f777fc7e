//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`packs`] - Pack install, uninstall, listing and sticker fetch
//! - [`maintenance`] - Download queue, refresh and orphan cleanup
//! - [`config`] - Configuration management (path, show, init)

pub mod common;
pub mod config;
pub mod maintenance;
pub mod packs;
