// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::fmt;

use super::certificate::Certificate;

/// The signing certificates seen on one archive entry. Iterates in
/// certificate order, so the sorted signer sequence falls out of iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignerSet(BTreeSet<Certificate>);

impl SignerSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn certificates(&self) -> impl Iterator<Item = &Certificate> {
        self.0.iter()
    }
}

impl FromIterator<Certificate> for SignerSet {
    fn from_iter<I: IntoIterator<Item = Certificate>>(iter: I) -> Self {
        SignerSet(iter.into_iter().collect())
    }
}

impl fmt::Display for SignerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CERTIFICATE SET (size={}):", self.0.len())?;
        for certificate in &self.0 {
            write!(f, "\n{}", certificate)?;
        }
        Ok(())
    }
}

/// Distinct signer sets observed across every entry of one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSignerProfile(BTreeSet<SignerSet>);

impl ArchiveSignerProfile {
    pub fn insert(&mut self, signers: SignerSet) -> bool {
        self.0.insert(signers)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn signer_sets(&self) -> impl Iterator<Item = &SignerSet> {
        self.0.iter()
    }

    /// The only signer set, if the archive was signed consistently.
    pub fn single(&self) -> Option<&SignerSet> {
        match self.0.len() {
            1 => self.0.first(),
            _ => None,
        }
    }

    pub(crate) fn listing(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
