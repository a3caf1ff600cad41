// SPDX-License-Identifier: Apache-2.0

//! Parser for the JAR manifest format, shared by `META-INF/MANIFEST.MF` and
//! the `.SF` signature files.
//!
//! Sections keep the byte range they were parsed from, since signature files
//! record digests over the exact manifest bytes.

use std::ops::Range;

use crate::digest::HashAlgorithm;

pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

pub const BUNDLE_SYMBOLIC_NAME: &str = "Bundle-SymbolicName";
pub const BUNDLE_VERSION: &str = "Bundle-Version";
pub const CORDA_CPK_TYPE: &str = "Corda-CPK-Type";

/// Ordered header values. Lookups ignore ASCII case, like JAR attribute names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Every `<ALG><suffix>` attribute whose algorithm we support, with its
    /// base64 value.
    pub(crate) fn digests<'a>(
        &'a self,
        suffix: &'a str,
    ) -> impl Iterator<Item = (HashAlgorithm, &'a str)> + 'a {
        self.iter().filter_map(move |(key, value)| {
            HashAlgorithm::from_attribute(key, suffix).map(|algorithm| (algorithm, value))
        })
    }

    fn push(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Attributes(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub attributes: Attributes,
    range: Range<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    raw: Vec<u8>,
    main: Attributes,
    main_range: Range<usize>,
    sections: Vec<Section>,
}

impl Manifest {
    pub fn parse(raw: Vec<u8>) -> Result<Self, String> {
        let mut main = Attributes::default();
        let mut main_range = 0..raw.len();
        let mut sections: Vec<Section> = Vec::new();
        let mut current = Attributes::default();
        // Header bytes with their continuations, decoded once complete.
        let mut pending: Option<Vec<u8>> = None;
        let mut section_start = 0;
        let mut in_main = true;

        for (line, range) in Lines::new(&raw) {
            if line.is_empty() {
                flush(&mut pending, &mut current)?;
                // Blank line terminates the current section, and belongs to it.
                if in_main {
                    main = std::mem::take(&mut current);
                    main_range = 0..range.end;
                    in_main = false;
                } else if !current.is_empty() {
                    sections.push(close_section(
                        std::mem::take(&mut current),
                        section_start..range.end,
                    )?);
                }
                section_start = range.end;
                continue;
            }

            if let Some(continuation) = line.strip_prefix(b" ") {
                pending
                    .as_mut()
                    .ok_or_else(|| "continuation line without a header".to_string())?
                    .extend_from_slice(continuation);
                continue;
            }

            flush(&mut pending, &mut current)?;
            pending = Some(line.to_vec());
        }
        flush(&mut pending, &mut current)?;

        if in_main {
            main = current;
        } else if !current.is_empty() {
            sections.push(close_section(current, section_start..raw.len())?);
        }

        Ok(Manifest {
            raw,
            main,
            main_range,
            sections,
        })
    }

    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The main section as written, including its terminating blank line.
    pub fn main_bytes(&self) -> &[u8] {
        &self.raw[self.main_range.clone()]
    }

    pub fn section_bytes(&self, section: &Section) -> &[u8] {
        &self.raw[section.range.clone()]
    }
}

fn close_section(attributes: Attributes, range: Range<usize>) -> Result<Section, String> {
    let name = attributes
        .get("Name")
        .ok_or_else(|| "entry section without a Name header".to_string())?
        .to_string();
    Ok(Section {
        name,
        attributes,
        range,
    })
}

/// Decodes a complete header and appends it to `attributes`.
fn flush(pending: &mut Option<Vec<u8>>, attributes: &mut Attributes) -> Result<(), String> {
    let Some(bytes) = pending.take() else {
        return Ok(());
    };
    let text = decode(&bytes)?;
    let (name, value) = text
        .split_once(": ")
        .or_else(|| text.strip_suffix(':').map(|name| (name, "")))
        .ok_or_else(|| format!("invalid header '{}'", text))?;
    if name.is_empty() {
        return Err(format!("invalid header '{}'", text));
    }
    attributes.push(name.to_string(), value.to_string());
    Ok(())
}

fn decode(bytes: &[u8]) -> Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| "header is not valid UTF-8".to_string())
}

/// Splits manifest bytes into lines, reporting each line's content and the
/// byte range it occupies including its terminator.
struct Lines<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> Lines<'a> {
    fn new(raw: &'a [u8]) -> Self {
        Lines { raw, pos: 0 }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = (&'a [u8], Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.raw.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.raw[start..];
        let (len, terminator) = match rest.iter().position(|b| *b == b'\r' || *b == b'\n') {
            Some(i) if rest[i] == b'\r' && rest.get(i + 1) == Some(&b'\n') => (i, 2),
            Some(i) => (i, 1),
            None => (rest.len(), 0),
        };
        self.pos = start + len + terminator;
        Some((&rest[..len], start..self.pos))
    }
}
