use std::path::PathBuf;

/// Failure to read a procedure document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid procedure document: {0}")]
    Toml(#[from] toml::de::Error),
}
