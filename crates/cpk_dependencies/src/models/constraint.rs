// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;

use super::dependency::HashValue;

/// Pins a library JAR bundled inside a CPK to the digest of its file.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DependencyConstraint {
    /// File name of the library, without any directory.
    pub file_name: String,
    pub hash: HashValue,
}

/// Every library constraint of one CPK, in the order the libraries were given.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyConstraints {
    pub constraints: Vec<DependencyConstraint>,
}

impl DependencyConstraints {
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}
