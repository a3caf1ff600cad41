// SPDX-License-Identifier: Apache-2.0

//! Decoding of JAR signature block files (`META-INF/*.RSA`, `*.DSA`, `*.EC`).

use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier};
use der::asn1::{ObjectIdentifier, OctetString};
use der::{Decode, Encode};
use x509_cert::Certificate as X509Certificate;

use crate::archive::CodeSigner;
use crate::models::certificate::Certificate;

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");

/// Extracts one [`CodeSigner`] per `SignerInfo` of a PKCS#7 signature block.
///
/// The certificate path starts at the certificate identified by the signer
/// and follows issuer links through the certificates embedded in the block.
pub(crate) fn code_signers(block: &[u8]) -> Result<Vec<CodeSigner>, String> {
    let content_info =
        ContentInfo::from_der(block).map_err(|e| format!("malformed signature block: {}", e))?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(format!(
            "signature block has content type {}, expected SignedData",
            content_info.content_type
        ));
    }
    let content = content_info
        .content
        .to_der()
        .map_err(|e| format!("malformed signature block: {}", e))?;
    let signed_data =
        SignedData::from_der(&content).map_err(|e| format!("malformed SignedData: {}", e))?;

    let certificates: Vec<X509Certificate> = signed_data
        .certificates
        .iter()
        .flat_map(|set| set.0.iter())
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(certificate) => Some(certificate.clone()),
            _ => None,
        })
        .collect();

    let mut signers = Vec::new();
    for signer_info in signed_data.signer_infos.0.iter() {
        let signer = certificates
            .iter()
            .position(|certificate| identifies(&signer_info.sid, certificate))
            .ok_or_else(|| "signer certificate not found in signature block".to_string())?;
        let certificate_path = certificate_path(&certificates, signer)
            .into_iter()
            .map(|certificate| {
                let der = certificate
                    .to_der()
                    .map_err(|e| format!("failed to encode certificate: {}", e))?;
                Certificate::from_der(&der)
            })
            .collect::<Result<Vec<_>, String>>()?;
        signers.push(CodeSigner { certificate_path });
    }
    Ok(signers)
}

fn identifies(sid: &SignerIdentifier, certificate: &X509Certificate) -> bool {
    let tbs = &certificate.tbs_certificate;
    match sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => {
            tbs.issuer == id.issuer && tbs.serial_number == id.serial_number
        }
        SignerIdentifier::SubjectKeyIdentifier(id) => {
            subject_key_identifier(certificate).as_deref() == Some(id.0.as_bytes())
        }
    }
}

fn subject_key_identifier(certificate: &X509Certificate) -> Option<Vec<u8>> {
    certificate
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|extension| extension.extn_id == ID_SUBJECT_KEY_IDENTIFIER)
        .and_then(|extension| OctetString::from_der(extension.extn_value.as_bytes()).ok())
        .map(|key_id| key_id.as_bytes().to_vec())
}

/// Leaf first, then each issuer found among `certificates`, stopping at a
/// self-issued certificate or when the issuer is not present.
fn certificate_path(certificates: &[X509Certificate], leaf: usize) -> Vec<&X509Certificate> {
    let mut path = vec![&certificates[leaf]];
    let mut used = vec![leaf];
    loop {
        let current = path[path.len() - 1];
        if current.tbs_certificate.subject == current.tbs_certificate.issuer {
            break;
        }
        let issuer = certificates.iter().enumerate().find(|(index, candidate)| {
            !used.contains(index) && candidate.tbs_certificate.subject == current.tbs_certificate.issuer
        });
        match issuer {
            Some((index, candidate)) => {
                used.push(index);
                path.push(candidate);
            }
            None => break,
        }
    }
    path
}
