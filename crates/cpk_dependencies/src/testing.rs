// SPDX-License-Identifier: Apache-2.0

//! In-memory archives and generated certificates for unit tests.

use std::cmp::Ordering;

use crate::archive::{ArchiveEntry, CodeSigner, SignedArchive};
use crate::error::{CpkError, Result};
use crate::manifest::Attributes;
use crate::models::certificate::{Certificate, compare_signed_bytes};

/// A fresh self-signed certificate with its own key pair.
pub(crate) fn certificate(common_name: &str) -> Certificate {
    let key = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(vec![format!("{}.example", common_name)]).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, common_name);
    let cert = params.self_signed(&key).unwrap();
    Certificate::from_der(cert.der()).unwrap()
}

/// An Ed25519 certificate, whose encoding length depends only on its fields.
fn ed25519_certificate(common_name: &str, names: usize, serial: Option<u64>) -> Certificate {
    let key = rcgen::KeyPair::generate_for(&rcgen::PKCS_ED25519).unwrap();
    let alt_names: Vec<String> = (0..names).map(|i| format!("san{}.example", i)).collect();
    let mut params = rcgen::CertificateParams::new(alt_names).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, common_name);
    params.serial_number = serial.map(rcgen::SerialNumber::from);
    let cert = params.self_signed(&key).unwrap();
    Certificate::from_der(cert.der()).unwrap()
}

/// `(shorter, longer)` certificates where the shorter encoding holds the
/// signed-greater byte at the first difference, so only length orders them.
pub(crate) fn length_ordered_pair() -> (Certificate, Certificate) {
    let candidates: Vec<Certificate> = (0..48)
        .map(|names| ed25519_certificate("length", names, None))
        .collect();
    for short in &candidates {
        for long in &candidates {
            if short.encoded().len() < long.encoded().len()
                && compare_signed_bytes(short.encoded(), long.encoded()) == Ordering::Greater
            {
                return (short.clone(), long.clone());
            }
        }
    }
    panic!("no certificate pair is ordered by length alone");
}

/// Equal-length certificates whose first differing byte is 0x80 in the first
/// and 0x7f in the second; signed comparison puts the first one first.
pub(crate) fn sign_ordered_pair() -> (Certificate, Certificate) {
    let negative = ed25519_certificate("sign", 0, Some(0x1080));
    let positive = ed25519_certificate("sign", 0, Some(0x107f));
    assert_eq!(negative.encoded().len(), positive.encoded().len());
    (negative, positive)
}

pub(crate) fn signer(certificate: &Certificate) -> CodeSigner {
    CodeSigner {
        certificate_path: vec![certificate.clone()],
    }
}

pub(crate) struct MemoryArchive {
    name: String,
    attributes: Attributes,
    entries: Vec<ArchiveEntry>,
    fail_at: Option<usize>,
    reads: usize,
}

impl MemoryArchive {
    pub(crate) fn new(name: &str) -> Self {
        MemoryArchive {
            name: name.to_string(),
            attributes: Attributes::default(),
            entries: Vec::new(),
            fail_at: None,
            reads: 0,
        }
    }

    pub(crate) fn bundle(mut self, symbolic_name: &str, version: &str) -> Self {
        self.attributes = [
            ("Manifest-Version", "1.0"),
            ("Bundle-SymbolicName", symbolic_name),
            ("Bundle-Version", version),
        ]
        .into_iter()
        .collect();
        self
    }

    pub(crate) fn attributes(mut self, attributes: &[(&str, &str)]) -> Self {
        self.attributes = attributes.iter().copied().collect();
        self
    }

    pub(crate) fn entry(mut self, name: &str, code_signers: Vec<CodeSigner>) -> Self {
        self.entries.push(ArchiveEntry {
            name: name.to_string(),
            is_dir: false,
            code_signers,
        });
        self
    }

    pub(crate) fn entry_with_path(self, name: &str, certificate_path: Vec<Certificate>) -> Self {
        self.entry(name, vec![CodeSigner { certificate_path }])
    }

    pub(crate) fn directory(mut self, name: &str) -> Self {
        self.entries.push(ArchiveEntry {
            name: name.to_string(),
            is_dir: true,
            code_signers: Vec::new(),
        });
        self
    }

    /// Makes reading entry `index` fail with an I/O error.
    pub(crate) fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads
    }
}

impl SignedArchive for MemoryArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn main_attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn read_entry(&mut self, index: usize, _buffer: &mut [u8]) -> Result<ArchiveEntry> {
        if self.fail_at == Some(index) {
            return Err(CpkError::Io {
                archive: self.name.clone(),
                source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated entry"),
            });
        }
        self.reads += 1;
        Ok(self.entries[index].clone())
    }
}
