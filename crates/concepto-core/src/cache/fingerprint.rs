//! Fingerprints of command definitions
//!
//! A command's fingerprint is the SHA-256 of the canonical JSON of its id,
//! requirement set and metadata. The library pseudo-record and every
//! command fingerprint are folded into one aggregate so an unchanged
//! registry can be recognised with a single comparison.
//!
//! The requirement fingerprint covers only which commands exist, their
//! declaration order and their requirement sets. Any change to it can move
//! a node to a different command, so it cannot be handled per command.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::Result;
use crate::registry::{Command, CommandMeta, CommandRegistry, LibraryMeta, RequirementSet, META_COMMAND_ID};

#[derive(Serialize)]
struct CommandDescriptor<'a> {
    id: &'a str,
    requirements: &'a RequirementSet,
    meta: &'a CommandMeta,
}

#[derive(Serialize)]
struct LibraryDescriptor<'a> {
    id: &'a str,
    name: &'a str,
    version: &'a str,
}

/// Fingerprint of a single command
///
/// # Errors
///
/// Returns `Serialization` if the descriptor cannot be serialized.
pub fn command_fingerprint(command: &Command) -> Result<String> {
    let canonical = serde_json::to_string(&CommandDescriptor {
        id: command.id(),
        requirements: command.requirements(),
        meta: command.meta(),
    })?;
    Ok(hash_string(&canonical))
}

/// Fingerprint of the library metadata pseudo-record
///
/// # Errors
///
/// Returns `Serialization` if the descriptor cannot be serialized.
pub fn library_fingerprint(library: &LibraryMeta) -> Result<String> {
    let canonical = serde_json::to_string(&LibraryDescriptor {
        id: META_COMMAND_ID,
        name: &library.name,
        version: &library.version,
    })?;
    Ok(hash_string(&canonical))
}

/// Fingerprint of the matching surface: ids, order and requirement sets
///
/// # Errors
///
/// Returns `Serialization` if a requirement set cannot be serialized.
pub fn requirements_fingerprint(registry: &CommandRegistry) -> Result<String> {
    let surface: Vec<(&str, &RequirementSet)> = registry
        .iter()
        .map(|c| (c.id(), c.requirements()))
        .collect();
    Ok(hash_string(&serde_json::to_string(&surface)?))
}

/// Fingerprint of an observed watched value; absent values hash too
pub fn watch_fingerprint(value: Option<&str>) -> String {
    match value {
        Some(v) => hash_string(&format!("some:{}", v)),
        None => hash_string("none"),
    }
}

/// All fingerprints of a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryFingerprint {
    pub library: String,
    pub requirements: String,
    pub commands: BTreeMap<String, String>,
    pub aggregate: String,
}

impl RegistryFingerprint {
    /// # Errors
    ///
    /// Returns `Serialization` if a descriptor cannot be serialized.
    pub fn compute(registry: &CommandRegistry) -> Result<Self> {
        let library = library_fingerprint(registry.library())?;
        let commands = registry
            .iter()
            .map(|c| Ok((c.id().to_string(), command_fingerprint(c)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let aggregate = aggregate(&library, &commands)?;
        Ok(Self {
            library,
            requirements: requirements_fingerprint(registry)?,
            commands,
            aggregate,
        })
    }
}

fn aggregate(library: &str, commands: &BTreeMap<String, String>) -> Result<String> {
    let canonical = serde_json::to_string(&(library, commands))?;
    Ok(hash_string(&canonical))
}

/// Hex SHA-256 of a string
pub fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
