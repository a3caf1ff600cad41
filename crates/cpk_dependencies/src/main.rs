// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cpk_dependencies::extractor;
use cpk_dependencies::generate;
use cpk_dependencies::pom::{CompanionPom, CompanionPublisher, FilePublisher, MavenCoordinate};
use cpk_dependencies::xml;
use cpk_dependencies::{JarArchive, SignedArchive};

#[derive(Parser)]
#[command(version, about = "Generate and inspect CorDapp CPK dependency documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the CPKDependencies document for a CorDapp's dependencies.
    Generate {
        /// CorDapp JARs built by this project; they share its signers.
        #[arg(long = "local", value_name = "JAR")]
        local: Vec<PathBuf>,

        /// CorDapp JARs resolved from elsewhere; their signers are recorded.
        #[arg(long = "remote", value_name = "JAR")]
        remote: Vec<PathBuf>,

        /// Digest algorithm for signer public key hashes.
        #[arg(long, env = "CPK_HASH_ALGORITHM", default_value = "SHA-256")]
        hash_algorithm: String,

        /// Output file, or directory to write CPKDependencies into.
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Write the DependencyConstraints document pinning a CPK's library JARs.
    Constraints {
        #[arg(value_name = "JAR")]
        libraries: Vec<PathBuf>,

        /// Digest algorithm for library file hashes.
        #[arg(long, env = "CPK_HASH_ALGORITHM", default_value = "SHA-256")]
        hash_algorithm: String,

        /// Output file, or directory to write DependencyConstraints into.
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Parse a CPKDependencies document and print it as JSON.
    Inspect {
        #[arg(value_name = "XML")]
        document: PathBuf,
    },
    /// Print the signer sets found across a JAR's entries.
    Signers {
        #[arg(value_name = "JAR")]
        jar: PathBuf,
    },
    /// Write the companion POM for a CorDapp publication.
    CompanionPom {
        #[arg(long)]
        group_id: String,

        #[arg(long)]
        artifact_id: String,

        #[arg(long)]
        version: String,

        /// CorDapp dependencies as Maven package URLs (pkg:maven/group/artifact@version).
        #[arg(long = "cordapp", value_name = "PURL")]
        cordapps: Vec<String>,

        /// Platform-provided dependencies as Maven package URLs.
        #[arg(long = "provided", value_name = "PURL")]
        provided: Vec<String>,

        #[arg(long, short)]
        output: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            local,
            remote,
            hash_algorithm,
            output,
        } => handle_generate(&local, &remote, &hash_algorithm, output)?,
        Commands::Constraints {
            libraries,
            hash_algorithm,
            output,
        } => handle_constraints(&libraries, &hash_algorithm, output)?,
        Commands::Inspect { document } => handle_inspect(document)?,
        Commands::Signers { jar } => handle_signers(jar)?,
        Commands::CompanionPom {
            group_id,
            artifact_id,
            version,
            cordapps,
            provided,
            output,
        } => handle_companion_pom(&group_id, &artifact_id, &version, &cordapps, &provided, output)?,
    }

    Ok(())
}

fn handle_generate(
    local: &[PathBuf],
    remote: &[PathBuf],
    hash_algorithm: &str,
    output: PathBuf,
) -> Result<()> {
    let written = generate::run(local, remote, hash_algorithm, &output)
        .with_context(|| format!("Failed to generate CPK dependencies into '{}'", output.display()))?;
    println!("{}", written.display());
    Ok(())
}

fn handle_constraints(libraries: &[PathBuf], hash_algorithm: &str, output: PathBuf) -> Result<()> {
    let written = generate::run_constraints(libraries, hash_algorithm, &output).with_context(|| {
        format!("Failed to generate dependency constraints into '{}'", output.display())
    })?;
    println!("{}", written.display());
    Ok(())
}

fn handle_inspect(path: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let document = xml::read_document(&text)
        .with_context(|| format!("Failed to parse '{}'", path.display()))?;

    let json_output =
        serde_json::to_string_pretty(&document).context("Failed to serialize document to JSON")?;
    println!("{}", json_output);
    Ok(())
}

fn handle_signers(path: PathBuf) -> Result<()> {
    let mut archive =
        JarArchive::open(&path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    let profile = extractor::profile(&mut archive)
        .with_context(|| format!("Failed to read signers of '{}'", path.display()))?;

    if profile.is_empty() {
        println!("{}: no signable entries", archive.name());
        return Ok(());
    }
    println!("{}: {} signer set(s)", archive.name(), profile.len());
    for signers in profile.signer_sets() {
        println!("\nCERTIFICATE SET (size={}):", signers.len());
        for certificate in signers.certificates() {
            println!("# {}", certificate);
            print!("{}", certificate.to_pem());
        }
    }
    Ok(())
}

fn handle_companion_pom(
    group_id: &str,
    artifact_id: &str,
    version: &str,
    cordapps: &[String],
    provided: &[String],
    output: PathBuf,
) -> Result<()> {
    let mut pom = CompanionPom::new(group_id, artifact_id, version);
    for purl in cordapps {
        pom.cordapps
            .push(MavenCoordinate::parse(purl).with_context(|| format!("Bad --cordapp '{}'", purl))?);
    }
    for purl in provided {
        pom.provided
            .push(MavenCoordinate::parse(purl).with_context(|| format!("Bad --provided '{}'", purl))?);
    }

    FilePublisher::new(&output)
        .publish(&pom)
        .with_context(|| format!("Failed to write companion POM '{}'", output.display()))?;
    Ok(())
}
