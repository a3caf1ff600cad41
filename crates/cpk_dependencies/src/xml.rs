// SPDX-License-Identifier: Apache-2.0

//! XML forms of the CPK dependency document and of the dependency
//! constraints document.
//!
//! ```xml
//! <cpkDependencies xmlns="urn:corda-cpk">
//!   <cpkDependency>
//!     <name>com.example.lib</name>
//!     <version>1.0.0</version>
//!     <type>corda-api</type>
//!     <signers>
//!       <signer algorithm="SHA-256">base64</signer>
//!     </signers>
//!   </cpkDependency>
//! </cpkDependencies>
//! ```
//!
//! ```xml
//! <dependencyConstraints xmlns="urn:corda-cpk">
//!   <dependencyConstraint>
//!     <fileName>library-1.0.jar</fileName>
//!     <hash algorithm="SHA-256">base64</hash>
//!   </dependencyConstraint>
//! </dependencyConstraints>
//! ```
//!
//! The readers are strict: any element it does not know is an error.

use std::io::Write;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{CpkError, Result};
use crate::models::constraint::{DependencyConstraint, DependencyConstraints};
use crate::models::dependency::{CpkDependencies, CpkDependency, CpkSigners, HashValue};

pub const CPK_XML_NAMESPACE: &str = "urn:corda-cpk";

const ROOT: &str = "cpkDependencies";
const DEPENDENCY: &str = "cpkDependency";
const NAME: &str = "name";
const VERSION: &str = "version";
const TYPE: &str = "type";
const SIGNERS: &str = "signers";
const SAME_AS_ME: &str = "sameAsMe";
const SIGNER: &str = "signer";
const ALGORITHM: &str = "algorithm";

const CONSTRAINTS_ROOT: &str = "dependencyConstraints";
const CONSTRAINT: &str = "dependencyConstraint";
const FILE_NAME: &str = "fileName";
const HASH: &str = "hash";

// --- Writing ---

pub fn write_document<W: Write>(document: &CpkDependencies, out: W) -> Result<()> {
    write_namespaced(out, ROOT, |writer| {
        for dependency in &document.dependencies {
            write_dependency(writer, dependency)?;
        }
        Ok(())
    })
}

pub fn to_xml_string(document: &CpkDependencies) -> Result<String> {
    let mut buffer = Vec::new();
    write_document(document, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| CpkError::parse(e.to_string()))
}

pub fn write_constraints<W: Write>(document: &DependencyConstraints, out: W) -> Result<()> {
    write_namespaced(out, CONSTRAINTS_ROOT, |writer| {
        for constraint in &document.constraints {
            writer.write_event(Event::Start(BytesStart::new(CONSTRAINT)))?;
            write_text_element(writer, FILE_NAME, &constraint.file_name)?;
            write_hash(writer, HASH, &constraint.hash)?;
            writer.write_event(Event::End(BytesEnd::new(CONSTRAINT)))?;
        }
        Ok(())
    })
}

pub fn constraints_to_xml_string(document: &DependencyConstraints) -> Result<String> {
    let mut buffer = Vec::new();
    write_constraints(document, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| CpkError::parse(e.to_string()))
}

/// Writes the declaration and a `urn:corda-cpk` root element around `body`.
fn write_namespaced<W: Write>(
    out: W,
    root: &str,
    body: impl FnOnce(&mut Writer<W>) -> std::io::Result<()>,
) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    let io = |e: std::io::Error| CpkError::Output {
        path: format!("<{}> document", root),
        source: e,
    };

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io)?;
    let mut start = BytesStart::new(root);
    start.push_attribute(("xmlns", CPK_XML_NAMESPACE));
    writer.write_event(Event::Start(start)).map_err(io)?;
    body(&mut writer).map_err(io)?;
    writer.write_event(Event::End(BytesEnd::new(root))).map_err(io)?;
    writer.get_mut().write_all(b"\n").map_err(io)?;
    Ok(())
}

fn write_dependency<W: Write>(writer: &mut Writer<W>, dependency: &CpkDependency) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(DEPENDENCY)))?;
    write_text_element(writer, NAME, &dependency.name)?;
    write_text_element(writer, VERSION, &dependency.version)?;
    if let Some(cpk_type) = &dependency.cpk_type {
        write_text_element(writer, TYPE, cpk_type)?;
    }
    match &dependency.signers {
        CpkSigners::SameAsMe => {
            writer.write_event(Event::Start(BytesStart::new(SIGNERS)))?;
            writer.write_event(Event::Empty(BytesStart::new(SAME_AS_ME)))?;
            writer.write_event(Event::End(BytesEnd::new(SIGNERS)))?;
        }
        CpkSigners::PublicKeyHashes(hashes) if hashes.is_empty() => {
            writer.write_event(Event::Empty(BytesStart::new(SIGNERS)))?;
        }
        CpkSigners::PublicKeyHashes(hashes) => {
            writer.write_event(Event::Start(BytesStart::new(SIGNERS)))?;
            for hash in hashes {
                write_hash(writer, SIGNER, hash)?;
            }
            writer.write_event(Event::End(BytesEnd::new(SIGNERS)))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new(DEPENDENCY)))?;
    Ok(())
}

fn write_hash<W: Write>(writer: &mut Writer<W>, tag: &str, hash: &HashValue) -> std::io::Result<()> {
    let mut start = BytesStart::new(tag);
    start.push_attribute((ALGORITHM, hash.algorithm.as_str()));
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(&hash.to_base64())))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

// --- Reading ---

/// An element start tag with the attributes we care about.
struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
}

impl Element {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

enum Node {
    Start(Element),
    Empty(Element),
    Text(String),
    End,
    Eof,
}

/// Pulls the structurally significant nodes out of the event stream:
/// declarations, comments and processing instructions are dropped here, and
/// whitespace-only text is dropped between elements. Leaf text is kept as
/// written.
struct NodeReader<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> NodeReader<'a> {
    fn new(xml: &'a str) -> Self {
        NodeReader {
            reader: Reader::from_str(xml),
        }
    }

    fn next(&mut self) -> Result<Node> {
        self.read_node(false)
    }

    fn read_node(&mut self, keep_whitespace: bool) -> Result<Node> {
        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| CpkError::parse(format!("malformed XML: {}", e)))?;
            let text = match event {
                Event::Start(start) => return Ok(Node::Start(element(&start)?)),
                Event::Empty(start) => return Ok(Node::Empty(element(&start)?)),
                Event::End(_) => return Ok(Node::End),
                Event::Eof => return Ok(Node::Eof),
                Event::Text(text) => text
                    .unescape()
                    .map_err(|e| CpkError::parse(format!("malformed text: {}", e)))?
                    .into_owned(),
                Event::CData(data) => String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| CpkError::parse(format!("malformed CDATA: {}", e)))?,
                _ => continue,
            };
            if keep_whitespace || !text.trim().is_empty() {
                return Ok(Node::Text(text));
            }
        }
    }

    /// Text content of a leaf element whose start tag was just read.
    fn text_content(&mut self, tag: &str) -> Result<String> {
        let mut content = String::new();
        loop {
            match self.read_node(true)? {
                Node::Text(text) => content.push_str(&text),
                Node::End => return Ok(content),
                Node::Start(child) | Node::Empty(child) => {
                    return Err(CpkError::parse(format!(
                        "Unknown XML element <{}> inside <{}>",
                        child.tag, tag
                    )));
                }
                Node::Eof => return Err(unexpected_eof(tag)),
            }
        }
    }
}

fn element(start: &BytesStart<'_>) -> Result<Element> {
    let tag = String::from_utf8(start.local_name().as_ref().to_vec())
        .map_err(|e| CpkError::parse(format!("malformed element name: {}", e)))?;
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute =
            attribute.map_err(|e| CpkError::parse(format!("malformed attribute on <{}>: {}", tag, e)))?;
        let key = String::from_utf8(attribute.key.as_ref().to_vec())
            .map_err(|e| CpkError::parse(format!("malformed attribute name: {}", e)))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| CpkError::parse(format!("malformed attribute value: {}", e)))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element { tag, attributes })
}

fn unexpected_eof(tag: &str) -> CpkError {
    CpkError::parse(format!("document ended inside <{}>", tag))
}

fn unknown_element(tag: &str) -> CpkError {
    CpkError::parse(format!("Unknown XML element <{}>", tag))
}

fn unexpected_text(text: &str, tag: &str) -> CpkError {
    CpkError::parse(format!("unexpected text '{}' inside <{}>", text.trim(), tag))
}

/// Reads the opening root element. Returns whether it was self-closing.
fn open_root(nodes: &mut NodeReader<'_>, expected: &str) -> Result<bool> {
    let (root, empty) = match nodes.next()? {
        Node::Start(element) => (element, false),
        Node::Empty(element) => (element, true),
        Node::Text(text) => {
            return Err(CpkError::parse(format!(
                "unexpected text '{}' before <{}>",
                text.trim(),
                expected
            )));
        }
        Node::End => return Err(CpkError::parse("unexpected end tag before root element")),
        Node::Eof => return Err(CpkError::parse(format!("missing <{}> root element", expected))),
    };
    if root.tag != expected {
        return Err(unknown_element(&root.tag));
    }
    if let Some(namespace) = root.attribute("xmlns") {
        if namespace != CPK_XML_NAMESPACE {
            return Err(CpkError::parse(format!(
                "unexpected namespace '{}', expected '{}'",
                namespace, CPK_XML_NAMESPACE
            )));
        }
    }
    Ok(empty)
}

/// Checks that nothing but ignorable content follows the root element.
fn close_root(nodes: &mut NodeReader<'_>, expected: &str) -> Result<()> {
    match nodes.next()? {
        Node::Eof => Ok(()),
        Node::Start(element) | Node::Empty(element) if element.tag == expected => {
            Err(CpkError::parse(format!("duplicate <{}> root element", expected)))
        }
        Node::Start(element) | Node::Empty(element) => Err(unknown_element(&element.tag)),
        Node::Text(text) => Err(CpkError::parse(format!(
            "unexpected text '{}' after <{}>",
            text.trim(),
            expected
        ))),
        Node::End => Err(CpkError::parse("unexpected end tag after root element")),
    }
}

fn missing(parent: &str, field: &str) -> CpkError {
    CpkError::parse(format!("{}.{} missing", parent, field))
}

pub fn read_document(xml: &str) -> Result<CpkDependencies> {
    let mut nodes = NodeReader::new(xml);
    let mut document = CpkDependencies::default();

    if !open_root(&mut nodes, ROOT)? {
        loop {
            match nodes.next()? {
                Node::Start(element) if element.tag == DEPENDENCY => {
                    document.dependencies.push(read_dependency(&mut nodes)?);
                }
                Node::Empty(element) if element.tag == DEPENDENCY => return Err(missing(DEPENDENCY, NAME)),
                Node::Start(element) | Node::Empty(element) => return Err(unknown_element(&element.tag)),
                Node::Text(text) => return Err(unexpected_text(&text, ROOT)),
                Node::End => break,
                Node::Eof => return Err(unexpected_eof(ROOT)),
            }
        }
    }
    close_root(&mut nodes, ROOT)?;
    Ok(document)
}

fn read_dependency(nodes: &mut NodeReader<'_>) -> Result<CpkDependency> {
    let mut name = None;
    let mut version = None;
    let mut cpk_type = None;
    let mut signers = None;

    loop {
        let (element, empty) = match nodes.next()? {
            Node::Start(element) => (element, false),
            Node::Empty(element) => (element, true),
            Node::Text(text) => return Err(unexpected_text(&text, DEPENDENCY)),
            Node::End => break,
            Node::Eof => return Err(unexpected_eof(DEPENDENCY)),
        };
        let slot = match element.tag.as_str() {
            NAME => &mut name,
            VERSION => &mut version,
            TYPE => &mut cpk_type,
            SIGNERS => {
                if signers.is_some() {
                    return Err(duplicate(SIGNERS, DEPENDENCY));
                }
                signers = Some(if empty {
                    CpkSigners::PublicKeyHashes(Vec::new())
                } else {
                    read_signers(nodes)?
                });
                continue;
            }
            other => return Err(unknown_element(other)),
        };
        if slot.is_some() {
            return Err(duplicate(&element.tag, DEPENDENCY));
        }
        *slot = Some(if empty {
            String::new()
        } else {
            nodes.text_content(&element.tag)?
        });
    }

    let name = name.ok_or_else(|| missing(DEPENDENCY, NAME))?;
    if name.trim().is_empty() {
        return Err(CpkError::parse(format!("{}.{} is empty", DEPENDENCY, NAME)));
    }
    Ok(CpkDependency {
        name,
        version: version.ok_or_else(|| missing(DEPENDENCY, VERSION))?,
        cpk_type,
        signers: signers.ok_or_else(|| missing(DEPENDENCY, SIGNERS))?,
    })
}

fn duplicate(tag: &str, parent: &str) -> CpkError {
    CpkError::parse(format!("duplicate <{}> element in <{}>", tag, parent))
}

fn read_signers(nodes: &mut NodeReader<'_>) -> Result<CpkSigners> {
    let mut same_as_me = false;
    let mut hashes = Vec::new();

    let not_alone = || {
        CpkError::parse(format!(
            "<{}> must be the only element in <{}>",
            SAME_AS_ME, SIGNERS
        ))
    };

    loop {
        match nodes.next()? {
            Node::Empty(element) if element.tag == SAME_AS_ME => {
                if same_as_me || !hashes.is_empty() {
                    return Err(not_alone());
                }
                same_as_me = true;
            }
            Node::Start(element) if element.tag == SAME_AS_ME => {
                if same_as_me || !hashes.is_empty() {
                    return Err(not_alone());
                }
                same_as_me = true;
                let content = nodes.text_content(SAME_AS_ME)?;
                if !content.trim().is_empty() {
                    return Err(unexpected_text(&content, SAME_AS_ME));
                }
            }
            Node::Start(element) if element.tag == SIGNER => {
                if same_as_me {
                    return Err(not_alone());
                }
                let content = nodes.text_content(SIGNER)?;
                hashes.push(hash_value(&element, &content)?);
            }
            Node::Empty(element) if element.tag == SIGNER => {
                return Err(CpkError::parse(format!("<{}> has no value", SIGNER)));
            }
            Node::Start(element) | Node::Empty(element) => return Err(unknown_element(&element.tag)),
            Node::Text(text) => return Err(unexpected_text(&text, SIGNERS)),
            Node::End => break,
            Node::Eof => return Err(unexpected_eof(SIGNERS)),
        }
    }

    Ok(if same_as_me {
        CpkSigners::SameAsMe
    } else {
        CpkSigners::PublicKeyHashes(hashes)
    })
}

/// A hash element: its `algorithm` attribute and base64 content.
fn hash_value(element: &Element, content: &str) -> Result<HashValue> {
    let algorithm = element
        .attribute(ALGORITHM)
        .filter(|algorithm| !algorithm.is_empty())
        .ok_or_else(|| missing(&element.tag, ALGORITHM))?;
    let value = STANDARD.decode(content.trim()).map_err(|e| {
        CpkError::parse(format!(
            "invalid {} value '{}': {}",
            element.tag,
            content.trim(),
            e
        ))
    })?;
    Ok(HashValue::new(algorithm, value))
}

pub fn read_constraints(xml: &str) -> Result<DependencyConstraints> {
    let mut nodes = NodeReader::new(xml);
    let mut document = DependencyConstraints::default();

    if !open_root(&mut nodes, CONSTRAINTS_ROOT)? {
        loop {
            match nodes.next()? {
                Node::Start(element) if element.tag == CONSTRAINT => {
                    document.constraints.push(read_constraint(&mut nodes)?);
                }
                Node::Empty(element) if element.tag == CONSTRAINT => {
                    return Err(missing(CONSTRAINT, FILE_NAME));
                }
                Node::Start(element) | Node::Empty(element) => return Err(unknown_element(&element.tag)),
                Node::Text(text) => return Err(unexpected_text(&text, CONSTRAINTS_ROOT)),
                Node::End => break,
                Node::Eof => return Err(unexpected_eof(CONSTRAINTS_ROOT)),
            }
        }
    }
    close_root(&mut nodes, CONSTRAINTS_ROOT)?;
    Ok(document)
}

fn read_constraint(nodes: &mut NodeReader<'_>) -> Result<DependencyConstraint> {
    let mut file_name = None;
    let mut hash = None;

    loop {
        let (element, empty) = match nodes.next()? {
            Node::Start(element) => (element, false),
            Node::Empty(element) => (element, true),
            Node::Text(text) => return Err(unexpected_text(&text, CONSTRAINT)),
            Node::End => break,
            Node::Eof => return Err(unexpected_eof(CONSTRAINT)),
        };
        match element.tag.as_str() {
            FILE_NAME => {
                if file_name.is_some() {
                    return Err(duplicate(FILE_NAME, CONSTRAINT));
                }
                file_name = Some(if empty {
                    String::new()
                } else {
                    nodes.text_content(FILE_NAME)?
                });
            }
            HASH => {
                if hash.is_some() {
                    return Err(duplicate(HASH, CONSTRAINT));
                }
                if empty {
                    return Err(CpkError::parse(format!("<{}> has no value", HASH)));
                }
                let content = nodes.text_content(HASH)?;
                hash = Some(hash_value(&element, &content)?);
            }
            other => return Err(unknown_element(other)),
        }
    }

    let file_name = file_name.ok_or_else(|| missing(CONSTRAINT, FILE_NAME))?;
    if file_name.trim().is_empty() {
        return Err(CpkError::parse(format!("{}.{} is empty", CONSTRAINT, FILE_NAME)));
    }
    Ok(DependencyConstraint {
        file_name,
        hash: hash.ok_or_else(|| missing(CONSTRAINT, HASH))?,
    })
}
