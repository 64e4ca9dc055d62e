use std::path::PathBuf;

use thiserror::Error;

/// Failure to make one asset drawable. Absorbed by the loader: the asset is
/// reported as settled but not ready.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("decode task for {} did not complete: {source}", path.display())]
    Join {
        path: PathBuf,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl AssetError {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Io { path, .. } | Self::Decode { path, .. } | Self::Join { path, .. } => path,
        }
    }
}
