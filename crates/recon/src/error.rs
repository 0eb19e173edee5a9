use interco_core::ReconError;
use interco_match::ConfigError;
use interco_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Recon(#[from] ReconError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// The domain error, if this is one.
    pub fn as_recon(&self) -> Option<&ReconError> {
        match self {
            Error::Recon(e) => Some(e),
            _ => None,
        }
    }
}
