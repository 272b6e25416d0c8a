//! Command registry
//!
//! A command pairs a requirement set with a handler. Commands are kept in
//! declaration order, which breaks ties between equally ranked candidates.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{ConceptoError, Result};
use crate::matcher::{CompiledRequirements, RequirementKind};
use crate::model::{ExecContext, ExecutionResult, HandlerResult, Node};

/// Id reserved for the library metadata pseudo-record
pub const META_COMMAND_ID: &str = "meta";

/// Declared requirements of a command; empty strings are "not declared"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequirementSet {
    pub icons: String,
    pub not_icons: String,
    pub not_empty: String,
    pub not_text_contains: String,
    pub empty: String,
    pub text_is: String,
    pub text_contains: String,
    pub text_pattern: String,
    pub level: String,
    pub or_has_parent: String,
    pub all_has_parent: String,
    pub or_is_parent: String,
    /// Replaces specificity as the rank score; it is not a separate tier
    ///
    /// Prioritized and unprioritized commands are ranked on one scale, so
    /// `priority: 1` ranks below an unprioritized command with two declared
    /// requirements. Use a value above the largest competing specificity to
    /// win outright.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl RequirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, kind: RequirementKind) -> &str {
        match kind {
            RequirementKind::Icons => &self.icons,
            RequirementKind::NotIcons => &self.not_icons,
            RequirementKind::NotEmpty => &self.not_empty,
            RequirementKind::NotTextContains => &self.not_text_contains,
            RequirementKind::Empty => &self.empty,
            RequirementKind::TextIs => &self.text_is,
            RequirementKind::TextContains => &self.text_contains,
            RequirementKind::TextPattern => &self.text_pattern,
            RequirementKind::Level => &self.level,
            RequirementKind::OrHasParent => &self.or_has_parent,
            RequirementKind::AllHasParent => &self.all_has_parent,
            RequirementKind::OrIsParent => &self.or_is_parent,
        }
    }

    /// Set one requirement kind
    pub fn with(mut self, kind: RequirementKind, value: impl Into<String>) -> Self {
        let slot = match kind {
            RequirementKind::Icons => &mut self.icons,
            RequirementKind::NotIcons => &mut self.not_icons,
            RequirementKind::NotEmpty => &mut self.not_empty,
            RequirementKind::NotTextContains => &mut self.not_text_contains,
            RequirementKind::Empty => &mut self.empty,
            RequirementKind::TextIs => &mut self.text_is,
            RequirementKind::TextContains => &mut self.text_contains,
            RequirementKind::TextPattern => &mut self.text_pattern,
            RequirementKind::Level => &mut self.level,
            RequirementKind::OrHasParent => &mut self.or_has_parent,
            RequirementKind::AllHasParent => &mut self.all_has_parent,
            RequirementKind::OrIsParent => &mut self.or_is_parent,
        };
        *slot = value.into();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Optional command metadata
///
/// Everything here participates in the command fingerprint, so bumping
/// `revision` is how an embedding application signals a changed handler
/// body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandMeta {
    pub revision: String,
    pub version: String,
    /// Autocomplete hint text
    pub hint: String,
    /// Autocomplete key text
    pub key_text: String,
    /// Commands whose change also invalidates this one
    pub watch_commands: Vec<String>,
    /// External values whose change invalidates this command
    pub watch_values: Vec<String>,
}

/// Identity of the command library as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryMeta {
    pub name: String,
    pub version: String,
}

impl LibraryMeta {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Handler invoked for a node that matched a command's requirements
pub trait CommandHandler: Send + Sync {
    fn execute(&self, node: &Node, ctx: &ExecContext<'_>) -> HandlerResult;
}

impl<F> CommandHandler for F
where
    F: Fn(&Node, &ExecContext<'_>) -> HandlerResult + Send + Sync,
{
    fn execute(&self, node: &Node, ctx: &ExecContext<'_>) -> HandlerResult {
        self(node, ctx)
    }
}

/// A registered command
#[derive(Clone)]
pub struct Command {
    id: String,
    requirements: RequirementSet,
    compiled: CompiledRequirements,
    meta: CommandMeta,
    handler: Arc<dyn CommandHandler>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("requirements", &self.requirements)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl Command {
    /// Create a command from a closure handler
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequirement` if the requirement set cannot be parsed.
    pub fn new<F>(id: impl Into<String>, requirements: RequirementSet, handler: F) -> Result<Self>
    where
        F: Fn(&Node, &ExecContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        Self::from_handler(id, requirements, Arc::new(handler))
    }

    /// Create a command from a shared handler object
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequirement` if the requirement set cannot be parsed.
    pub fn from_handler(
        id: impl Into<String>,
        requirements: RequirementSet,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<Self> {
        let id = id.into();
        let compiled = CompiledRequirements::compile(&id, &requirements)?;
        Ok(Self {
            id,
            requirements,
            compiled,
            meta: CommandMeta::default(),
            handler,
        })
    }

    pub fn with_meta(mut self, meta: CommandMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    pub fn compiled(&self) -> &CompiledRequirements {
        &self.compiled
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn execute(&self, node: &Node, ctx: &ExecContext<'_>) -> ExecutionResult {
        self.handler.execute(node, ctx).into()
    }
}

/// Ordered set of commands plus the library identity
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    library: LibraryMeta,
    commands: Vec<Command>,
    index: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new(library: LibraryMeta) -> Self {
        Self {
            library,
            commands: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn library(&self) -> &LibraryMeta {
        &self.library
    }

    pub fn set_library(&mut self, library: LibraryMeta) {
        self.library = library;
    }

    /// Register a command
    ///
    /// Re-registering an existing id replaces its definition but keeps its
    /// declaration position.
    ///
    /// # Errors
    ///
    /// Returns `ReservedCommandId` for the metadata pseudo-command id.
    pub fn register(&mut self, command: Command) -> Result<()> {
        if command.id == META_COMMAND_ID {
            return Err(ConceptoError::ReservedCommandId {
                command_id: command.id,
            });
        }
        match self.index.get(&command.id) {
            Some(&pos) => self.commands[pos] = command,
            None => {
                self.index.insert(command.id.clone(), self.commands.len());
                self.commands.push(command);
            }
        }
        Ok(())
    }

    /// Additively merge another registry's commands into this one
    ///
    /// # Errors
    ///
    /// Propagates registration errors.
    pub fn merge(&mut self, other: CommandRegistry) -> Result<()> {
        for command in other.commands {
            self.register(command)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Command> {
        self.index.get(id).map(|&pos| &self.commands[pos])
    }

    /// Declaration index of a command
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Commands in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Ids of commands declaring a watch dependency on `id`
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|c| c.meta.watch_commands.iter().any(|w| w == id))
            .map(|c| c.id.as_str())
            .collect()
    }
}
