// SPDX-License-Identifier: Apache-2.0

//! Builds real JAR files for the integration tests: manifests with entry
//! digests, `.SF` files and PKCS#7 signature blocks around rcgen
//! certificates. The signature value in each block is filler; only the
//! certificates and the digest chain are checked when reading.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo, SignerInfos,
};
use der::asn1::{ObjectIdentifier, OctetString, SetOfVec};
use der::{Any, Decode};
use sha2::{Digest, Sha256};
use x509_cert::Certificate as X509Certificate;
use x509_cert::spki::AlgorithmIdentifierOwned;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use cpk_dependencies::Certificate;

const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const ID_ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

/// A signing identity: its certificate chain, leaf first.
#[derive(Clone)]
pub struct Signer {
    pub alias: String,
    pub chain: Vec<Vec<u8>>,
}

impl Signer {
    pub fn self_signed(alias: &str) -> Self {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = params(alias).self_signed(&key).unwrap();
        Signer {
            alias: alias.to_uppercase(),
            chain: vec![cert.der().to_vec()],
        }
    }

    /// A leaf issued by its own CA; the block carries both certificates.
    pub fn with_ca(alias: &str) -> Self {
        let ca_key = rcgen::KeyPair::generate().unwrap();
        let mut ca_params = params(&format!("{} CA", alias));
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let leaf = params(alias).signed_by(&leaf_key, &ca, &ca_key).unwrap();
        Signer {
            alias: alias.to_uppercase(),
            chain: vec![leaf.der().to_vec(), ca.der().to_vec()],
        }
    }

    pub fn leaf(&self) -> Certificate {
        Certificate::from_der(&self.chain[0]).unwrap()
    }

    pub fn public_key_sha256(&self) -> Vec<u8> {
        Sha256::digest(self.leaf().public_key_encoded()).to_vec()
    }

    fn block(&self) -> Vec<u8> {
        let certificates: Vec<X509Certificate> = self
            .chain
            .iter()
            .map(|der| X509Certificate::from_der(der).unwrap())
            .collect();
        let leaf = &certificates[0].tbs_certificate;
        let algorithm = |oid| AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        };

        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: leaf.issuer.clone(),
                serial_number: leaf.serial_number.clone(),
            }),
            digest_alg: algorithm(ID_SHA256),
            signed_attrs: None,
            signature_algorithm: algorithm(ID_ECDSA_WITH_SHA256),
            signature: OctetString::new(vec![0x5a; 64]).unwrap(),
            unsigned_attrs: None,
        };
        // Chain order inside the block must not matter.
        let certificate_set = SetOfVec::try_from(
            certificates
                .iter()
                .rev()
                .cloned()
                .map(CertificateChoices::Certificate)
                .collect::<Vec<_>>(),
        )
        .unwrap();
        let digest_algorithms = SetOfVec::try_from(vec![algorithm(ID_SHA256)]).unwrap();
        let signer_infos = SetOfVec::try_from(vec![signer_info]).unwrap();

        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_DATA,
                econtent: None,
            },
            certificates: Some(CertificateSet(certificate_set)),
            crls: None,
            signer_infos: SignerInfos(signer_infos),
        };
        let content_info = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data).unwrap(),
        };
        der::Encode::to_der(&content_info).unwrap()
    }
}

fn params(common_name: &str) -> rcgen::CertificateParams {
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, common_name);
    params
}

/// Describes a JAR to be written to disk.
#[derive(Default)]
pub struct JarBuilder {
    main_attributes: Vec<(String, String)>,
    entries: Vec<(String, Vec<u8>)>,
    directories: Vec<String>,
    signers: Vec<Signer>,
    /// Entries added after signing; present in the ZIP but not the manifest.
    unsigned_extras: Vec<(String, Vec<u8>)>,
    /// Entries added after signing along with their own manifest section,
    /// as `jar uf` does.
    appended: Vec<(String, Vec<u8>)>,
    /// Entries whose content differs from what the manifest digest says.
    tampered: Vec<String>,
    /// Entries replaced after signing with their manifest digest updated, so
    /// only the `.SF` section digest disagrees.
    rewritten: Vec<String>,
    /// Main attributes replaced after signing.
    forged: Vec<(String, String)>,
    /// Entries in the manifest that the `.SF` files have no section for.
    unlisted: Vec<String>,
    no_manifest: bool,
}

impl JarBuilder {
    pub fn new() -> Self {
        JarBuilder::default()
    }

    pub fn bundle(self, symbolic_name: &str, version: &str) -> Self {
        self.attribute("Bundle-SymbolicName", symbolic_name)
            .attribute("Bundle-Version", version)
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.main_attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn entry(mut self, name: &str, content: &[u8]) -> Self {
        self.entries.push((name.to_string(), content.to_vec()));
        self
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.directories.push(name.to_string());
        self
    }

    pub fn signed_by(mut self, signer: &Signer) -> Self {
        self.signers.push(signer.clone());
        self
    }

    pub fn unsigned_extra(mut self, name: &str, content: &[u8]) -> Self {
        self.unsigned_extras.push((name.to_string(), content.to_vec()));
        self
    }

    pub fn append_after_signing(mut self, name: &str, content: &[u8]) -> Self {
        self.appended.push((name.to_string(), content.to_vec()));
        self
    }

    pub fn tamper(mut self, name: &str) -> Self {
        self.tampered.push(name.to_string());
        self
    }

    pub fn rewrite_after_signing(mut self, name: &str) -> Self {
        self.rewritten.push(name.to_string());
        self
    }

    pub fn forge_attribute(mut self, name: &str, value: &str) -> Self {
        self.forged.push((name.to_string(), value.to_string()));
        self
    }

    pub fn leave_out_of_signature_file(mut self, name: &str) -> Self {
        self.unlisted.push(name.to_string());
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.no_manifest = true;
        self
    }

    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();

        if !self.no_manifest {
            let signed = self.signed_manifest();
            zip.start_file("META-INF/MANIFEST.MF", options).unwrap();
            zip.write_all(&self.final_manifest()).unwrap();

            for signer in &self.signers {
                zip.start_file(format!("META-INF/{}.SF", signer.alias), options)
                    .unwrap();
                zip.write_all(&signature_file(&signed, &self.unlisted)).unwrap();
                zip.start_file(format!("META-INF/{}.EC", signer.alias), options)
                    .unwrap();
                zip.write_all(&signer.block()).unwrap();
            }
        }

        for directory in &self.directories {
            zip.add_directory(directory.as_str(), options).unwrap();
        }
        for (name, content) in &self.entries {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(self.written_content(name, content)).unwrap();
        }
        for (name, content) in self.unsigned_extras.iter().chain(&self.appended) {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    fn written_content<'a>(&self, name: &str, content: &'a [u8]) -> &'a [u8] {
        if self.tampered.iter().chain(&self.rewritten).any(|n| n == name) {
            b"tampered"
        } else {
            content
        }
    }

    /// The manifest the signers saw.
    fn signed_manifest(&self) -> SignedManifest {
        let main = main_section(&self.main_attributes);
        let mut sections = Vec::new();
        if !self.signers.is_empty() {
            for (name, content) in &self.entries {
                sections.push((name.clone(), entry_section(name, content)));
            }
        }
        SignedManifest { main, sections }
    }

    fn final_manifest(&self) -> Vec<u8> {
        let signed = self.signed_manifest();
        let mut manifest = if self.forged.is_empty() {
            signed.main.clone()
        } else {
            let attributes: Vec<(String, String)> = self
                .main_attributes
                .iter()
                .map(|(name, value)| {
                    let forged = self.forged.iter().find(|(n, _)| n == name);
                    (name.clone(), forged.map_or(value, |(_, v)| v).clone())
                })
                .collect();
            main_section(&attributes)
        };
        for (name, section) in &signed.sections {
            if self.rewritten.contains(name) {
                manifest.extend(entry_section(name, b"tampered"));
            } else {
                manifest.extend(section);
            }
        }
        for (name, content) in &self.appended {
            manifest.extend(entry_section(name, content));
        }
        manifest
    }
}

struct SignedManifest {
    main: Vec<u8>,
    sections: Vec<(String, Vec<u8>)>,
}

impl SignedManifest {
    fn bytes(&self) -> Vec<u8> {
        let mut bytes = self.main.clone();
        for (_, section) in &self.sections {
            bytes.extend(section);
        }
        bytes
    }
}

fn main_section(attributes: &[(String, String)]) -> Vec<u8> {
    let mut main = String::from("Manifest-Version: 1.0\r\n");
    for (name, value) in attributes {
        main.push_str(&format!("{}: {}\r\n", name, value));
    }
    main.push_str("\r\n");
    main.into_bytes()
}

fn entry_section(name: &str, content: &[u8]) -> Vec<u8> {
    format!(
        "Name: {}\r\nSHA-256-Digest: {}\r\n\r\n",
        name,
        STANDARD.encode(Sha256::digest(content))
    )
    .into_bytes()
}

/// A `.SF` file laid out the way jarsigner writes one.
fn signature_file(manifest: &SignedManifest, unlisted: &[String]) -> Vec<u8> {
    let mut sf = format!(
        "Signature-Version: 1.0\r\nSHA-256-Digest-Manifest: {}\r\nSHA-256-Digest-Manifest-Main-Attributes: {}\r\nCreated-By: cpk-dependencies tests\r\n\r\n",
        STANDARD.encode(Sha256::digest(manifest.bytes())),
        STANDARD.encode(Sha256::digest(&manifest.main)),
    );
    for (name, section) in manifest.sections.iter().filter(|(name, _)| !unlisted.contains(name)) {
        sf.push_str(&format!(
            "Name: {}\r\nSHA-256-Digest: {}\r\n\r\n",
            name,
            STANDARD.encode(Sha256::digest(section))
        ));
    }
    sf.into_bytes()
}
