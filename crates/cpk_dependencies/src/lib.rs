// SPDX-License-Identifier: Apache-2.0

//! Generates and reads the CPK dependency document of a CorDapp: which other
//! CPKs it depends on, and who must have signed them. Also pins the library
//! JARs bundled in a CPK through the dependency constraints document.

pub mod archive;
pub mod digest;
pub mod error;
pub mod extractor;
pub mod generate;
pub mod jar;
pub mod manifest;
pub mod models;
pub mod pom;
mod signature;
pub mod writer;
pub mod xml;

#[cfg(test)]
mod testing;

pub use archive::{ArchiveEntry, CodeSigner, SignedArchive};
pub use digest::HashAlgorithm;
pub use error::{CpkError, ErrorKind, Result};
pub use jar::JarArchive;
pub use models::certificate::Certificate;
pub use models::constraint::{DependencyConstraint, DependencyConstraints};
pub use models::dependency::{CpkDependencies, CpkDependency, CpkSigners, HashValue};
pub use models::signers::{ArchiveSignerProfile, SignerSet};
pub use writer::DependencyGraphWriter;
