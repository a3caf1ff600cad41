// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use sha1::Sha1;
use sha2::digest::DynDigest;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{CpkError, Result};

/// Message digests we can compute for signer fingerprints and JAR manifest checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Resolves a digest algorithm by its standard name, e.g. `SHA-256`.
    /// Names are matched case-insensitively and the dashless spelling is accepted.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SHA-1" | "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA-256" | "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA-384" | "SHA384" => Ok(HashAlgorithm::Sha384),
            "SHA-512" | "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(CpkError::UnsupportedAlgorithm(name.to_string())),
        }
    }

    /// Maps a manifest attribute name such as `SHA-256-Digest` or
    /// `SHA1-Digest-Manifest` onto its algorithm.
    pub(crate) fn from_attribute(attribute: &str, suffix: &str) -> Option<Self> {
        let upper = attribute.to_ascii_uppercase();
        let name = upper.strip_suffix(&suffix.to_ascii_uppercase())?;
        HashAlgorithm::from_name(name).ok()
    }

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
            HashAlgorithm::Sha512 => "SHA-512",
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Incremental hasher for streaming archive entries.
    pub(crate) fn hasher(&self) -> Box<dyn DynDigest> {
        match self {
            HashAlgorithm::Sha1 => Box::new(Sha1::new()),
            HashAlgorithm::Sha256 => Box::new(Sha256::new()),
            HashAlgorithm::Sha384 => Box::new(Sha384::new()),
            HashAlgorithm::Sha512 => Box::new(Sha512::new()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
