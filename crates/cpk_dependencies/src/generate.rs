// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::digest::HashAlgorithm;
use crate::error::{CpkError, Result};
use crate::jar::JarArchive;
use crate::models::constraint::{DependencyConstraint, DependencyConstraints};
use crate::models::dependency::{CpkDependencies, HashValue};
use crate::writer::DependencyGraphWriter;
use crate::xml;

/// File name used when the output location is a directory.
pub const CPK_DEPENDENCIES_FILE: &str = "CPKDependencies";
pub const DEPENDENCY_CONSTRAINTS_FILE: &str = "DependencyConstraints";

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Builds the dependency document for one CPK: every local archive first,
/// then every remote archive, each in the order given.
///
/// The hash algorithm is resolved before any archive is opened. The first
/// failure aborts the pass.
pub fn generate_dependencies(
    local: &[PathBuf],
    remote: &[PathBuf],
    hash_algorithm: &str,
) -> Result<CpkDependencies> {
    let mut writer = DependencyGraphWriter::for_algorithm(hash_algorithm)?;

    for path in local {
        let archive = JarArchive::open(path)?;
        info!("Project CorDapp CPK dependency: {}", path.display());
        writer.append_local(&archive)?;
    }
    for path in remote {
        let mut archive = JarArchive::open(path)?;
        info!("Remote CorDapp CPK dependency: {}", path.display());
        writer.append_remote(&mut archive)?;
    }

    Ok(writer.finish())
}

/// Where the document ends up for a given `--output` argument.
pub fn resolve_output(output: &Path) -> PathBuf {
    resolve_in(output, CPK_DEPENDENCIES_FILE)
}

fn resolve_in(output: &Path, file_name: &str) -> PathBuf {
    if output.is_dir() {
        output.join(file_name)
    } else {
        output.to_path_buf()
    }
}

/// Serializes `document` and atomically replaces `output` with it.
pub fn write_dependencies(document: &CpkDependencies, output: &Path) -> Result<PathBuf> {
    let target = resolve_output(output);
    replace(&target, |file| xml::write_document(document, file))?;
    debug!(
        "Wrote {} CPK dependencies to {}",
        document.len(),
        target.display()
    );
    Ok(target)
}

/// Writes through a temporary file in the target's directory, then persists
/// it over the target, so readers never see a partial document.
fn replace(target: &Path, write: impl FnOnce(&mut NamedTempFile) -> Result<()>) -> Result<()> {
    let failed = |source: std::io::Error| CpkError::Output {
        path: target.display().to_string(),
        source,
    };

    let directory = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut file = NamedTempFile::new_in(&directory).map_err(failed)?;
    write(&mut file)?;
    file.as_file_mut().flush().map_err(failed)?;
    file.as_file().sync_all().map_err(failed)?;
    file.persist(target).map_err(|e| failed(e.error))?;
    Ok(())
}

/// One complete pass: generate, then write only if everything succeeded.
pub fn run(local: &[PathBuf], remote: &[PathBuf], hash_algorithm: &str, output: &Path) -> Result<PathBuf> {
    let document = generate_dependencies(local, remote, hash_algorithm)?;
    write_dependencies(&document, output)
}

/// Pins each library JAR by the digest of its whole file, in the order given.
pub fn generate_constraints(libraries: &[PathBuf], hash_algorithm: &str) -> Result<DependencyConstraints> {
    let algorithm = HashAlgorithm::from_name(hash_algorithm)?;
    let mut document = DependencyConstraints::default();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    for path in libraries {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let io = |source: std::io::Error| CpkError::Io {
            archive: file_name.clone(),
            source,
        };

        let mut file = File::open(path).map_err(io)?;
        let mut hasher = algorithm.hasher();
        loop {
            let read = file.read(&mut buffer).map_err(io)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        info!("CPK library dependency: {}", path.display());
        document.constraints.push(DependencyConstraint {
            file_name,
            hash: HashValue::new(algorithm.name(), hasher.finalize().to_vec()),
        });
    }

    Ok(document)
}

/// Hashes `libraries` and atomically replaces `output` with the constraints
/// document (`DependencyConstraints` inside a directory).
pub fn run_constraints(libraries: &[PathBuf], hash_algorithm: &str, output: &Path) -> Result<PathBuf> {
    let document = generate_constraints(libraries, hash_algorithm)?;
    let target = resolve_in(output, DEPENDENCY_CONSTRAINTS_FILE);
    replace(&target, |file| xml::write_constraints(&document, file))?;
    debug!(
        "Wrote {} dependency constraints to {}",
        document.len(),
        target.display()
    );
    Ok(target)
}
