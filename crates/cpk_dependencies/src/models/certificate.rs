// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;
use std::fmt;

use der::{Decode, Encode};
use sha2::{Digest, Sha256};
use x509_cert::Certificate as X509Certificate;

/// A DER-encoded X.509 certificate.
///
/// Identity is the encoded byte sequence: two certificates are equal exactly
/// when their encodings are equal. Ordering is by encoded length first, then
/// by the first differing byte compared as a signed 8-bit value.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    public_key: Vec<u8>,
    subject: String,
    issuer: String,
    serial: String,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let cert = X509Certificate::from_der(der)
            .map_err(|e| format!("failed to parse X.509 certificate: {}", e))?;
        let tbs = &cert.tbs_certificate;
        let public_key = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| format!("failed to encode public key: {}", e))?;
        Ok(Certificate {
            der: der.to_vec(),
            public_key,
            subject: tbs.subject.to_string(),
            issuer: tbs.issuer.to_string(),
            serial: tbs.serial_number.to_string(),
        })
    }

    pub fn encoded(&self) -> &[u8] {
        &self.der
    }

    /// DER encoding of the SubjectPublicKeyInfo.
    pub fn public_key_encoded(&self) -> &[u8] {
        &self.public_key
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new("CERTIFICATE", self.der.clone()))
    }
}

/// Compares encodings byte by byte as signed values, first difference wins.
pub(crate) fn compare_signed_bytes(left: &[u8], right: &[u8]) -> Ordering {
    left.iter()
        .zip(right)
        .map(|(l, r)| (*l as i8).cmp(&(*r as i8)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl Ord for Certificate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.der
            .len()
            .cmp(&other.der.len())
            .then_with(|| compare_signed_bytes(&self.der, &other.der))
    }
}

impl PartialOrd for Certificate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl std::hash::Hash for Certificate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.der.hash(state);
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Subject: {}, Issuer: {}, Serial: {}, SHA-256: {}",
            self.subject,
            self.issuer,
            self.serial,
            hex::encode(Sha256::digest(&self.der))
        )
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("len", &self.der.len())
            .finish()
    }
}
