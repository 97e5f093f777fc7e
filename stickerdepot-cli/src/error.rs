//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use stickerdepot::cdn::TransportError;
use stickerdepot::config::ConfigFileError;
use stickerdepot::identity::ShareLinkError;
use stickerdepot::stickers::StickerError;
use stickerdepot::store::StoreError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigFileError),
    /// Failed to open the sticker database
    Store(StoreError),
    /// Failed to build the CDN client
    Transport(TransportError),
    /// Argument is not a sticker pack link
    Link { input: String, error: ShareLinkError },
    /// Sticker operation failed
    Sticker(StickerError),
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Link { .. } => {
                eprintln!();
                eprintln!("Expected a link of the form:");
                eprintln!("  https://signal.art/addstickers/#pack_id=<hex>&pack_key=<hex>");
            }
            CliError::Sticker(e) if e.is_retryable() => {
                eprintln!();
                eprintln!("This failure is temporary. Queue the pack with 'stickerdepot enqueue'");
                eprintln!("and run 'stickerdepot resume' later.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Store(e) => write!(f, "Failed to open sticker database: {}", e),
            CliError::Transport(e) => write!(f, "Failed to create CDN client: {}", e),
            CliError::Link { input, error } => {
                write!(f, "Invalid pack link '{}': {}", input, error)
            }
            CliError::Sticker(e) => write!(f, "{}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Transport(e) => Some(e),
            CliError::Link { error, .. } => Some(error),
            CliError::Sticker(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            CliError::LoggingInit(_) => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<TransportError> for CliError {
    fn from(e: TransportError) -> Self {
        CliError::Transport(e)
    }
}

impl From<StickerError> for CliError {
    fn from(e: StickerError) -> Self {
        CliError::Sticker(e)
    }
}
