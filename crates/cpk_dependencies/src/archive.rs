// SPDX-License-Identifier: Apache-2.0

use crate::error::Result;
use crate::manifest::Attributes;
use crate::models::certificate::Certificate;

/// One signer of an archive entry: its certificate path, signing certificate first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSigner {
    pub certificate_path: Vec<Certificate>,
}

impl CodeSigner {
    pub fn signing_certificate(&self) -> Option<&Certificate> {
        self.certificate_path.first()
    }
}

/// What reading an entry revealed about it.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_dir: bool,
    /// Empty when no signature covers the entry.
    pub code_signers: Vec<CodeSigner>,
}

/// A JAR-like archive whose entries may carry code signers.
///
/// Signer information for an entry is only known once its contents have been
/// read in full, so `read_entry` consumes the whole entry before reporting it.
pub trait SignedArchive {
    /// File name used in log lines and error messages.
    fn name(&self) -> &str;

    /// Main manifest attributes; empty if the archive has no manifest.
    fn main_attributes(&self) -> &Attributes;

    fn entry_count(&self) -> usize;

    /// Reads entry `index` to the end through `buffer` and reports its signers.
    fn read_entry(&mut self, index: usize, buffer: &mut [u8]) -> Result<ArchiveEntry>;
}
