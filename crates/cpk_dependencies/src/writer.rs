// SPDX-License-Identifier: Apache-2.0

use tracing::error;

use crate::archive::SignedArchive;
use crate::digest::HashAlgorithm;
use crate::error::{CpkError, Result};
use crate::extractor;
use crate::manifest::{Attributes, BUNDLE_SYMBOLIC_NAME, BUNDLE_VERSION, CORDA_CPK_TYPE};
use crate::models::dependency::{CpkDependencies, CpkDependency, CpkSigners, HashValue};

/// Builds the CPK dependency document one archive at a time.
///
/// The writer owns the document until [`finish`](Self::finish) hands it
/// back; records keep the order in which archives were appended.
#[derive(Debug)]
pub struct DependencyGraphWriter {
    algorithm: HashAlgorithm,
    document: CpkDependencies,
}

impl DependencyGraphWriter {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        DependencyGraphWriter {
            algorithm,
            document: CpkDependencies::default(),
        }
    }

    /// Resolves `algorithm` by name first, so an unsupported algorithm fails
    /// before any archive is read.
    pub fn for_algorithm(algorithm: &str) -> Result<Self> {
        HashAlgorithm::from_name(algorithm).map(DependencyGraphWriter::new)
    }

    /// Records a dependency built by this same project. Its signers are ours,
    /// so the archive's own signatures are not inspected.
    pub fn append_local<A: SignedArchive + ?Sized>(&mut self, archive: &A) -> Result<()> {
        let dependency = dependency_for(archive.name(), archive.main_attributes(), CpkSigners::SameAsMe)?;
        self.document.dependencies.push(dependency);
        Ok(())
    }

    /// Records a dependency resolved from elsewhere, identified by the hashes
    /// of its signers' public keys. Every signable entry must carry the same
    /// set of signers.
    pub fn append_remote<A: SignedArchive + ?Sized>(&mut self, archive: &mut A) -> Result<()> {
        let profile = extractor::profile(archive)?;
        let Some(signers) = profile.single() else {
            error!(
                "CPK {} signed by {} sets of signers:\n{}",
                archive.name(),
                profile.len(),
                profile.listing()
            );
            return Err(CpkError::MultipleSignerSets {
                archive: archive.name().to_string(),
                count: profile.len(),
                listing: profile.listing(),
            });
        };

        let hashes = signers
            .certificates()
            .map(|certificate| {
                HashValue::new(
                    self.algorithm.name(),
                    self.algorithm.digest(certificate.public_key_encoded()),
                )
            })
            .collect();
        let dependency = dependency_for(
            archive.name(),
            archive.main_attributes(),
            CpkSigners::PublicKeyHashes(hashes),
        )?;
        self.document.dependencies.push(dependency);
        Ok(())
    }

    pub fn finish(self) -> CpkDependencies {
        self.document
    }
}

fn dependency_for(archive: &str, attributes: &Attributes, signers: CpkSigners) -> Result<CpkDependency> {
    let required = |attribute: &str| {
        attributes
            .get(attribute)
            .map(str::to_string)
            .ok_or_else(|| CpkError::MissingAttribute {
                archive: archive.to_string(),
                attribute: attribute.to_string(),
            })
    };
    let name = required(BUNDLE_SYMBOLIC_NAME)?;
    if name.trim().is_empty() {
        return Err(CpkError::MissingAttribute {
            archive: archive.to_string(),
            attribute: BUNDLE_SYMBOLIC_NAME.to_string(),
        });
    }
    Ok(CpkDependency {
        name,
        version: required(BUNDLE_VERSION)?,
        cpk_type: attributes.get(CORDA_CPK_TYPE).map(str::to_string),
        signers,
    })
}
