// SPDX-License-Identifier: Apache-2.0

//! Companion POMs: a `pom`-packaged artifact published next to each CorDapp
//! JAR, whose dependencies point at the companions of the CorDapps it uses.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use packageurl::PackageUrl;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::info;

use crate::error::{CpkError, Result};

const POM_NAMESPACE: &str = "http://maven.apache.org/POM/4.0.0";
const POM_SCHEMA_LOCATION: &str =
    "http://maven.apache.org/POM/4.0.0 https://maven.apache.org/xsd/maven-4.0.0.xsd";
const DEFAULT_TYPE: &str = "jar";

pub fn companion_artifact_id(group_id: &str, artifact_id: &str) -> String {
    format!("{}.{}.corda.cpk", group_id, artifact_id)
}

/// A resolved Maven artifact, e.g. `pkg:maven/com.example/lib@1.0?classifier=sources`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    pub artifact_type: String,
}

impl MavenCoordinate {
    pub fn parse(purl_str: &str) -> Result<Self> {
        let invalid = |reason: String| CpkError::Coordinate {
            purl: purl_str.to_string(),
            reason,
        };
        let purl = PackageUrl::from_str(purl_str).map_err(|e| invalid(e.to_string()))?;

        if purl.ty() != "maven" {
            return Err(invalid(format!("type must be 'maven', found '{}'", purl.ty())));
        }
        let group_id = purl
            .namespace()
            .filter(|namespace| !namespace.is_empty())
            .ok_or_else(|| invalid("a group id namespace is required".to_string()))?
            .to_string();
        let version = purl
            .version()
            .ok_or_else(|| invalid("a version is required".to_string()))?
            .to_string();

        let qualifiers = purl.qualifiers();
        Ok(MavenCoordinate {
            group_id,
            artifact_id: purl.name().to_string(),
            version,
            classifier: qualifiers.get("classifier").map(|c| c.to_string()),
            artifact_type: qualifiers
                .get("type")
                .map(|t| t.to_string())
                .unwrap_or_else(|| DEFAULT_TYPE.to_string()),
        })
    }
}

impl FromStr for MavenCoordinate {
    type Err = CpkError;

    fn from_str(s: &str) -> Result<Self> {
        MavenCoordinate::parse(s)
    }
}

impl fmt::Display for MavenCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        Ok(())
    }
}

/// The companion POM of one CorDapp publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionPom {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    /// Other CorDapps; referenced through their own companions.
    pub cordapps: Vec<MavenCoordinate>,
    /// Libraries provided by the platform; referenced as they are.
    pub provided: Vec<MavenCoordinate>,
}

impl CompanionPom {
    /// Companion for the CorDapp `group_id:artifact_id:version`.
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        CompanionPom {
            group_id: group_id.to_string(),
            artifact_id: companion_artifact_id(group_id, artifact_id),
            version: version.to_string(),
            cordapps: Vec::new(),
            provided: Vec::new(),
        }
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_xml(&mut buffer)
            .map_err(|source| CpkError::Output {
                path: format!("companion POM {}", self.artifact_id),
                source,
            })?;
        String::from_utf8(buffer).map_err(|e| CpkError::parse(e.to_string()))
    }

    fn write_xml<W: Write>(&self, out: W) -> std::io::Result<()> {
        let mut writer = Writer::new_with_indent(out, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut project = BytesStart::new("project");
        project.push_attribute(("xmlns", POM_NAMESPACE));
        project.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
        project.push_attribute(("xsi:schemaLocation", POM_SCHEMA_LOCATION));
        writer.write_event(Event::Start(project))?;
        text_element(&mut writer, "modelVersion", "4.0.0")?;
        text_element(&mut writer, "groupId", &self.group_id)?;
        text_element(&mut writer, "artifactId", &self.artifact_id)?;
        text_element(&mut writer, "version", &self.version)?;
        text_element(&mut writer, "packaging", "pom")?;

        writer.write_event(Event::Start(BytesStart::new("dependencies")))?;
        for cordapp in &self.cordapps {
            let artifact_id = companion_artifact_id(&cordapp.group_id, &cordapp.artifact_id);
            dependency(&mut writer, cordapp, &artifact_id)?;
        }
        for provided in &self.provided {
            dependency(&mut writer, provided, &provided.artifact_id)?;
        }
        writer.write_event(Event::End(BytesEnd::new("dependencies")))?;

        writer.write_event(Event::End(BytesEnd::new("project")))?;
        writer.get_mut().write_all(b"\n")
    }
}

fn dependency<W: Write>(
    writer: &mut Writer<W>,
    coordinate: &MavenCoordinate,
    artifact_id: &str,
) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("dependency")))?;
    text_element(writer, "groupId", &coordinate.group_id)?;
    text_element(writer, "artifactId", artifact_id)?;
    text_element(writer, "version", &coordinate.version)?;
    if let Some(classifier) = &coordinate.classifier {
        text_element(writer, "classifier", classifier)?;
    }
    if coordinate.artifact_type != DEFAULT_TYPE {
        text_element(writer, "type", &coordinate.artifact_type)?;
    }
    text_element(writer, "scope", "compile")?;
    writer.write_event(Event::End(BytesEnd::new("dependency")))?;
    Ok(())
}

fn text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Somewhere a companion POM can be published to. Repository integrations
/// implement this and are handed to the caller explicitly.
pub trait CompanionPublisher {
    fn publish(&self, pom: &CompanionPom) -> Result<()>;
}

/// Publishes by writing the POM to a local file.
#[derive(Debug, Clone)]
pub struct FilePublisher {
    path: PathBuf,
}

impl FilePublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePublisher { path: path.into() }
    }
}

impl CompanionPublisher for FilePublisher {
    fn publish(&self, pom: &CompanionPom) -> Result<()> {
        let xml = pom.to_xml()?;
        fs::write(&self.path, xml).map_err(|source| CpkError::Output {
            path: self.path.display().to_string(),
            source,
        })?;
        info!(
            "Companion POM {}:{}:{} written to {}",
            pom.group_id,
            pom.artifact_id,
            pom.version,
            self.path.display()
        );
        Ok(())
    }
}
