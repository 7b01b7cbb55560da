//! Module-boundary error types. Leaf modules return these via thiserror;
//! the CLI boundary collapses everything into `anyhow::Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn transcoder process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to capture transcoder stderr")]
    NoStderr,

    #[error("failed to read transcoder stderr: {0}")]
    ReadStderr(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not reach catalog at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("catalog replied with status {0}")]
    BadStatus(reqwest::StatusCode),

    #[error("platform '{0}' is not supported by the catalog")]
    UnsupportedPlatform(String),

    #[error("could not decode catalog response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("failed to unpack archive {name}: {source}")]
    Unpack {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("staged file not found: {0}")]
    MissingFile(String),

    #[error("io error staging {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("requested GPU index {requested} out of range (found {available} GPUs)")]
    GpuIndexOutOfRange { requested: u32, available: usize },
}
