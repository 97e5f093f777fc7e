//! Orchestrator errors.

use std::io;
use std::path::Path;
use thiserror::Error;

use crate::cdn::DownloadError;
use crate::gate::CoalesceError;
use crate::manifest::ManifestError;
use crate::store::StoreError;

/// Failure of a sticker manager operation.
///
/// `Clone` because sticker downloads are shared between coalesced callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StickerError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The pack has no item with this index.
    #[error("pack {pack} has no sticker {index}")]
    UnknownSticker { pack: String, index: u32 },

    #[error("{0}")]
    Io(String),

    /// The shared download task went away without producing a result.
    #[error("sticker download was abandoned")]
    Abandoned,
}

impl StickerError {
    pub(crate) fn io(action: &str, path: &Path, err: io::Error) -> Self {
        Self::Io(format!("{action} {}: {err}", path.display()))
    }

    /// Whether a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Download(e) => e.is_retryable(),
            Self::Manifest(e) => e.is_retryable(),
            Self::Abandoned => true,
            Self::Store(_) | Self::UnknownSticker { .. } | Self::Io(_) => false,
        }
    }
}

impl From<CoalesceError> for StickerError {
    fn from(_: CoalesceError) -> Self {
        Self::Abandoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdn::TransportError;

    #[test]
    fn test_retryable_follows_transport() {
        let transient = StickerError::from(DownloadError::Transport {
            path: "p".into(),
            source: TransportError::Status(503),
        });
        assert!(transient.is_retryable());

        let absent = StickerError::from(ManifestError::Download(DownloadError::Transport {
            path: "p".into(),
            source: TransportError::Status(404),
        }));
        assert!(!absent.is_retryable());

        assert!(!StickerError::from(ManifestError::Empty).is_retryable());
        assert!(!StickerError::Io("disk full".into()).is_retryable());
    }
}
