// SPDX-License-Identifier: Apache-2.0

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Serialize, Serializer};

/// A digest together with the name of the algorithm that produced it.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct HashValue {
    /// Standard algorithm name, e.g. "SHA-256".
    pub algorithm: String,
    #[serde(serialize_with = "as_base64")]
    pub value: Vec<u8>,
}

impl HashValue {
    pub fn new(algorithm: impl Into<String>, value: Vec<u8>) -> Self {
        HashValue {
            algorithm: algorithm.into(),
            value,
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.value)
    }
}

fn as_base64<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(value))
}

/// Who signed a CPK dependency.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CpkSigners {
    /// Built alongside the consuming CPK, so it carries the same signers.
    SameAsMe,
    /// Public key hashes of the signing certificates, in certificate order.
    /// Empty for an unsigned dependency.
    PublicKeyHashes(Vec<HashValue>),
}

/// One entry of the CPK dependency graph.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CpkDependency {
    /// Bundle-SymbolicName of the dependency.
    pub name: String,
    /// Bundle-Version of the dependency.
    pub version: String,
    /// Optional Corda-CPK-Type tag.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub cpk_type: Option<String>,
    pub signers: CpkSigners,
}

/// The complete dependency document, in processing order.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CpkDependencies {
    pub dependencies: Vec<CpkDependency>,
}

impl CpkDependencies {
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
