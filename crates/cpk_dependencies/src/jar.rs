// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::debug;
use zip::ZipArchive;

use crate::archive::{ArchiveEntry, CodeSigner, SignedArchive};
use crate::error::{CpkError, Result};
use crate::manifest::{Attributes, MANIFEST_NAME, Manifest};
use crate::signature;

const SIGNATURE_BLOCK_EXTENSIONS: [&str; 3] = ["RSA", "DSA", "EC"];

/// Signers described by one `.SF` file and its block file.
struct SignatureFile {
    path: String,
    code_signers: Vec<CodeSigner>,
    /// Manifest entries whose sections this `.SF` file vouches for.
    covered: HashSet<String>,
}

/// A JAR file on disk. Entries are verified against their manifest digests
/// as they are read, and report the signers whose `.SF` files cover them.
pub struct JarArchive {
    name: String,
    zip: ZipArchive<File>,
    manifest: Manifest,
    signature_files: Vec<SignatureFile>,
}

impl JarArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = File::open(path).map_err(|source| CpkError::Io {
            archive: name.clone(),
            source,
        })?;
        let mut zip = ZipArchive::new(file).map_err(|source| CpkError::Zip {
            archive: name.clone(),
            source,
        })?;

        let manifest = match read_named(&mut zip, &name, MANIFEST_NAME)? {
            Some(bytes) => Manifest::parse(bytes).map_err(|reason| CpkError::Manifest {
                archive: name.clone(),
                reason,
            })?,
            None => Manifest::default(),
        };
        let signature_files = load_signature_files(&mut zip, &name, &manifest)?;
        debug!(
            "{}: {} entries, {} signature files",
            name,
            zip.len(),
            signature_files.len()
        );

        Ok(JarArchive {
            name,
            zip,
            manifest,
            signature_files,
        })
    }
}

impl SignedArchive for JarArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn main_attributes(&self) -> &Attributes {
        self.manifest.main_attributes()
    }

    fn entry_count(&self) -> usize {
        self.zip.len()
    }

    fn read_entry(&mut self, index: usize, buffer: &mut [u8]) -> Result<ArchiveEntry> {
        let archive = self.name.as_str();
        let mut file = self.zip.by_index(index).map_err(|source| CpkError::Zip {
            archive: archive.to_string(),
            source,
        })?;
        let name = file.name().to_string();
        let is_dir = file.is_dir();

        let mut checks: Vec<_> = self
            .manifest
            .section(&name)
            .map(|section| {
                section
                    .attributes
                    .digests("-Digest")
                    .map(|(algorithm, expected)| (algorithm, expected, algorithm.hasher()))
                    .collect()
            })
            .unwrap_or_default();

        loop {
            let read = file.read(buffer).map_err(|source| CpkError::Io {
                archive: format!("{}:{}", archive, name),
                source,
            })?;
            if read == 0 {
                break;
            }
            for (_, _, hasher) in checks.iter_mut() {
                hasher.update(&buffer[..read]);
            }
        }
        drop(file);

        let verified = !checks.is_empty();
        for (algorithm, expected, hasher) in checks {
            if !digest_matches(&hasher.finalize(), expected) {
                return Err(CpkError::signature(
                    archive,
                    format!("{} digest error for {}", algorithm, name),
                ));
            }
        }

        // The manifest has no section of its own; every signature file signs it.
        let code_signers = if name.eq_ignore_ascii_case(MANIFEST_NAME) {
            self.signature_files
                .iter()
                .flat_map(|sf| sf.code_signers.iter().cloned())
                .collect()
        } else if verified && !is_dir {
            self.signature_files
                .iter()
                .filter(|sf| sf.covered.contains(&name))
                .flat_map(|sf| sf.code_signers.iter().cloned())
                .collect()
        } else {
            Vec::new()
        };

        Ok(ArchiveEntry {
            name,
            is_dir,
            code_signers,
        })
    }
}

fn digest_matches(actual: &[u8], expected_base64: &str) -> bool {
    STANDARD
        .decode(expected_base64.trim())
        .map(|expected| expected == actual)
        .unwrap_or(false)
}

/// Reads an entry looked up case-insensitively, the way JAR readers locate
/// their metadata.
fn read_named(zip: &mut ZipArchive<File>, archive: &str, wanted: &str) -> Result<Option<Vec<u8>>> {
    let Some(actual) = zip
        .file_names()
        .find(|candidate| candidate.eq_ignore_ascii_case(wanted))
        .map(str::to_string)
    else {
        return Ok(None);
    };
    let mut file = zip.by_name(&actual).map_err(|source| CpkError::Zip {
        archive: archive.to_string(),
        source,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|source| CpkError::Io {
        archive: format!("{}:{}", archive, actual),
        source,
    })?;
    Ok(Some(bytes))
}

fn load_signature_files(
    zip: &mut ZipArchive<File>,
    archive: &str,
    manifest: &Manifest,
) -> Result<Vec<SignatureFile>> {
    let names: Vec<String> = zip.file_names().map(str::to_string).collect();
    let mut signature_files = Vec::new();

    for sf_name in &names {
        let upper = sf_name.to_ascii_uppercase();
        let Some(base) = upper
            .strip_prefix("META-INF/")
            .and_then(|rest| rest.strip_suffix(".SF"))
        else {
            continue;
        };
        if base.is_empty() || base.contains('/') {
            continue;
        }

        // A .SF file only counts when it has a block file to go with it.
        let Some(block_name) = SIGNATURE_BLOCK_EXTENSIONS.iter().find_map(|extension| {
            let wanted = format!("META-INF/{}.{}", base, extension);
            names.iter().find(|n| n.eq_ignore_ascii_case(&wanted)).cloned()
        }) else {
            debug!("{}: {} has no signature block, ignoring", archive, sf_name);
            continue;
        };

        let sf_bytes = read_named(zip, archive, sf_name)?.unwrap_or_default();
        let sf = Manifest::parse(sf_bytes)
            .map_err(|reason| CpkError::signature(archive, format!("{}: {}", sf_name, reason)))?;
        let block = read_named(zip, archive, &block_name)?.unwrap_or_default();
        let code_signers = signature::code_signers(&block)
            .map_err(|reason| CpkError::signature(archive, format!("{}: {}", block_name, reason)))?;
        let covered = covered_entries(&sf, manifest, archive, sf_name)?;

        signature_files.push(SignatureFile {
            path: sf_name.clone(),
            code_signers,
            covered,
        });
    }

    for sf in &signature_files {
        debug!(
            "{}: {} covers {} entries with {} signers",
            archive,
            sf.path,
            sf.covered.len(),
            sf.code_signers.len()
        );
    }
    Ok(signature_files)
}

/// Works out which manifest entries a `.SF` file vouches for.
///
/// If its whole-manifest digest matches, every section the `.SF` names is
/// covered. Otherwise the main attributes digest, when present, must still
/// match, and each named section is checked against its own digest.
fn covered_entries(
    sf: &Manifest,
    manifest: &Manifest,
    archive: &str,
    sf_name: &str,
) -> Result<HashSet<String>> {
    let whole_manifest = sf
        .main_attributes()
        .digests("-Digest-Manifest")
        .any(|(algorithm, expected)| digest_matches(&algorithm.digest(manifest.raw()), expected));
    if whole_manifest {
        return Ok(sf
            .sections()
            .iter()
            .map(|section| section.name.clone())
            .collect());
    }

    for (algorithm, expected) in sf.main_attributes().digests("-Digest-Manifest-Main-Attributes") {
        if !digest_matches(&algorithm.digest(manifest.main_bytes()), expected) {
            return Err(CpkError::signature(
                archive,
                format!(
                    "invalid {} signature file digest in {} for manifest main attributes",
                    algorithm, sf_name
                ),
            ));
        }
    }

    let mut covered = HashSet::new();
    for section in sf.sections() {
        let Some(target) = manifest.section(&section.name) else {
            continue;
        };
        let mut checked = false;
        for (algorithm, expected) in section.attributes.digests("-Digest") {
            let actual = algorithm.digest(manifest.section_bytes(target));
            if !digest_matches(&actual, expected) {
                return Err(CpkError::signature(
                    archive,
                    format!(
                        "invalid {} signature file digest in {} for {}",
                        algorithm, sf_name, section.name
                    ),
                ));
            }
            checked = true;
        }
        if checked {
            covered.insert(section.name.clone());
        }
    }
    Ok(covered)
}
