use std::{io, path::PathBuf, process::ExitStatus};
use thiserror::Error;

/// Failures talking to the mangadex api or scraping a reader page.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed {what}: {reason}")]
    Malformed { what: String, reason: String },

    #[error("{what} reported status {status:?}")]
    Unsuccessful { what: String, status: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("creation of {path} failed")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The payload was none of the image formats we accept.
    #[error("page {page} is not a png, jpeg, gif or webp image")]
    MissingAsset { page: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("browser capture of {url} failed: {reason}")]
    Browser { url: String, reason: String },

    #[error("unable to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{} page file(s) missing, archive aborted", .missing.len())]
    Incomplete { missing: Vec<PathBuf> },

    #[error("unable to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("io error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to build {path}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}
