// SPDX-License-Identifier: Apache-2.0

use std::io;

use thiserror::Error;

/// Coarse classification of a [`CpkError`], used by callers that only care
/// about how a failure should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Io,
    Parse,
}

#[derive(Debug, Error)]
pub enum CpkError {
    /// The requested digest algorithm is not one we can compute.
    #[error("unsupported hash algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("invalid Maven coordinate '{purl}': {reason}")]
    Coordinate { purl: String, reason: String },

    #[error("CPK {archive} is missing manifest attribute {attribute}")]
    MissingAttribute { archive: String, attribute: String },

    #[error("CPK {archive} must be signed by exactly one set of signers, found {count}:\n{listing}")]
    MultipleSignerSets {
        archive: String,
        count: usize,
        listing: String,
    },

    #[error("invalid manifest in {archive}: {reason}")]
    Manifest { archive: String, reason: String },

    #[error("invalid signature metadata in {archive}: {reason}")]
    Signature { archive: String, reason: String },

    #[error("failed to read {archive}: {source}")]
    Io {
        archive: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read archive {archive}: {source}")]
    Zip {
        archive: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to write {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid CPK XML document: {0}")]
    Parse(String),
}

impl CpkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CpkError::UnsupportedAlgorithm(_) | CpkError::Coordinate { .. } => ErrorKind::Configuration,
            CpkError::MissingAttribute { .. }
            | CpkError::MultipleSignerSets { .. }
            | CpkError::Manifest { .. }
            | CpkError::Signature { .. } => ErrorKind::Validation,
            CpkError::Io { .. } | CpkError::Zip { .. } | CpkError::Output { .. } => ErrorKind::Io,
            CpkError::Parse(_) => ErrorKind::Parse,
        }
    }

    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        CpkError::Parse(reason.into())
    }

    pub(crate) fn signature(archive: &str, reason: impl Into<String>) -> Self {
        CpkError::Signature {
            archive: archive.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CpkError>;
