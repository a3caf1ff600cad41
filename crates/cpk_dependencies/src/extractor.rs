// SPDX-License-Identifier: Apache-2.0

use tracing::warn;

use crate::archive::{ArchiveEntry, SignedArchive};
use crate::error::Result;
use crate::models::signers::{ArchiveSignerProfile, SignerSet};

const SCRATCH_BUFFER_SIZE: usize = 8 * 1024;

const SIGNATURE_SUFFIXES: [&str; 4] = [".SF", ".DSA", ".RSA", ".EC"];

/// Whether an entry is expected to carry signers. Directories and the JAR
/// signature metadata itself are exempt:
/// `META-INF/*.SF|*.DSA|*.RSA|*.EC`, `META-INF/SIG-*` and `META-INF/INDEX.LIST`.
pub fn is_signable(name: &str, is_dir: bool) -> bool {
    if is_dir {
        return false;
    }
    let Some(rest) = name.strip_prefix("META-INF/") else {
        return true;
    };
    let exempt = rest == "INDEX.LIST"
        || rest.strip_prefix("SIG-").is_some_and(|tail| !tail.is_empty())
        || SIGNATURE_SUFFIXES
            .iter()
            .any(|suffix| rest.strip_suffix(suffix).is_some_and(|stem| !stem.is_empty()));
    !exempt
}

/// Signers of one entry, or `None` for an exempt entry. Exempt entries are
/// skipped whatever signers they report.
fn entry_signers(archive: &str, entry: &ArchiveEntry) -> Option<SignerSet> {
    if !is_signable(&entry.name, entry.is_dir) {
        return None;
    }
    let signers: SignerSet = entry
        .code_signers
        .iter()
        .filter_map(|signer| signer.signing_certificate().cloned())
        .collect();
    if signers.is_empty() {
        warn!("{}:{} is unsigned", archive, entry.name);
    }
    Some(signers)
}

/// Reads every entry of `archive` and collects the distinct sets of signing
/// certificates found on them. Unsigned signable entries contribute the
/// empty set.
pub fn profile<A: SignedArchive + ?Sized>(archive: &mut A) -> Result<ArchiveSignerProfile> {
    let mut buffer = vec![0u8; SCRATCH_BUFFER_SIZE];
    let mut profile = ArchiveSignerProfile::default();
    for index in 0..archive.entry_count() {
        let entry = archive.read_entry(index, &mut buffer)?;
        if let Some(signers) = entry_signers(archive.name(), &entry) {
            profile.insert(signers);
        }
    }
    Ok(profile)
}
