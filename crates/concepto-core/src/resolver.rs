//! Command resolution
//!
//! Resolves every node to exactly one valid command:
//! - candidates are the commands whose declared requirements all hold,
//!   ordered by rank score (descending) then declaration order
//! - a single candidate's handler is invoked directly
//! - multiple candidates are tried in rank order until one replies valid;
//!   candidates after the winner are never invoked
//!
//! Both candidate lists and resolutions (including failures) are memoized
//! per node id for the lifetime of the resolver, which is one compilation
//! run.

use std::collections::HashMap;

use crate::document::DocumentQuery;
use crate::errors::{ConceptoError, Result};
use crate::matcher::matches_local;
use crate::model::{Emission, ExecContext, ExecutionResult, Node, StateMap};
use crate::registry::{Command, CommandRegistry};

/// A command whose requirements all hold for a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub command_id: String,
    /// Number of declared requirement kinds
    pub specificity: u32,
    pub priority: Option<i64>,
    /// Explicit priority, else specificity
    pub rank_score: i64,
    pub declaration_index: usize,
}

/// The winning command for a node and what its handler emitted
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub command_id: String,
    pub emission: Emission,
    /// Higher-ranked candidates that replied invalid or failed
    pub rejected: Vec<String>,
}

/// Per-run command resolver over one document and one registry
pub struct Resolver<'r, D: DocumentQuery + ?Sized> {
    pub(crate) registry: &'r CommandRegistry,
    pub(crate) doc: &'r D,
    candidates_memo: HashMap<String, Vec<MatchCandidate>>,
    valid_memo: HashMap<String, Result<Resolution>>,
    pub(crate) brother_memo: HashMap<(String, bool), bool>,
    handler_calls: u64,
    debug: bool,
}

impl<'r, D: DocumentQuery + ?Sized> Resolver<'r, D> {
    pub fn new(registry: &'r CommandRegistry, doc: &'r D) -> Self {
        Self {
            registry,
            doc,
            candidates_memo: HashMap::new(),
            valid_memo: HashMap::new(),
            brother_memo: HashMap::new(),
            handler_calls: 0,
            debug: false,
        }
    }

    /// Raise per-node decision events from `debug` to `info`
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Number of handler invocations so far
    pub fn handler_calls(&self) -> u64 {
        self.handler_calls
    }

    pub fn registry(&self) -> &'r CommandRegistry {
        self.registry
    }

    pub fn document(&self) -> &'r D {
        self.doc
    }

    /// Ordered candidates for a node
    ///
    /// Relational requirements resolve the node's ancestors, using
    /// `global` as process-wide state and an empty branch state.
    pub fn resolve_candidates(&mut self, node: &Node, global: &StateMap) -> Vec<MatchCandidate> {
        if let Some(hit) = self.candidates_memo.get(&node.id) {
            return hit.clone();
        }

        let registry = self.registry;
        let mut candidates: Vec<MatchCandidate> = registry
            .iter()
            .enumerate()
            .filter(|(_, command)| self.command_matches(command, node, global))
            .map(|(declaration_index, command)| {
                let compiled = command.compiled();
                MatchCandidate {
                    command_id: command.id().to_string(),
                    specificity: compiled.specificity,
                    priority: compiled.priority,
                    rank_score: compiled.rank_score(),
                    declaration_index,
                }
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.rank_score
                .cmp(&a.rank_score)
                .then(a.declaration_index.cmp(&b.declaration_index))
        });

        self.candidates_memo
            .insert(node.id.clone(), candidates.clone());
        candidates
    }

    fn command_matches(&mut self, command: &Command, node: &Node, global: &StateMap) -> bool {
        // Node-local predicates come first in the compiled list
        command
            .compiled()
            .predicates
            .iter()
            .all(|predicate| match matches_local(predicate, node) {
                Some(matched) => matched,
                None => self.matches_relational(predicate, node, global),
            })
    }

    /// Resolve the single valid command for a node
    ///
    /// # Errors
    ///
    /// - `NoMatchingCommand` if no command's requirements hold
    /// - `HandlerFailed` if the only candidate's handler failed
    /// - `NoValidCandidate` if no candidate replied valid
    pub fn resolve_valid(
        &mut self,
        node: &Node,
        branch: &StateMap,
        global: &StateMap,
    ) -> Result<Resolution> {
        if let Some(hit) = self.valid_memo.get(&node.id) {
            return hit.clone();
        }
        let outcome = self.resolve_uncached(node, branch, global);
        self.valid_memo.insert(node.id.clone(), outcome.clone());
        outcome
    }

    fn resolve_uncached(
        &mut self,
        node: &Node,
        branch: &StateMap,
        global: &StateMap,
    ) -> Result<Resolution> {
        let candidates = self.resolve_candidates(node, global);
        let registry = self.registry;
        let ctx = ExecContext::new(branch, global);

        match candidates.as_slice() {
            [] => {
                self.trace(&node.id, None, "no_match");
                Err(ConceptoError::NoMatchingCommand {
                    node_id: node.id.clone(),
                })
            }
            [only] => {
                let command = self.command(&only.command_id)?;
                self.handler_calls += 1;
                match command.execute(node, &ctx) {
                    ExecutionResult::Valid(emission) => {
                        self.trace(&node.id, Some(command.id()), "valid");
                        Ok(Resolution {
                            command_id: command.id().to_string(),
                            emission,
                            rejected: Vec::new(),
                        })
                    }
                    ExecutionResult::Invalid => {
                        self.trace(&node.id, Some(command.id()), "invalid");
                        Err(ConceptoError::NoValidCandidate {
                            node_id: node.id.clone(),
                            candidates: vec![command.id().to_string()],
                            failures: vec![format!("{}: invalid", command.id())],
                        })
                    }
                    ExecutionResult::Error(err) => {
                        self.trace(&node.id, Some(command.id()), "handler_error");
                        Err(ExecutionResult::into_error(err, &node.id, command.id()))
                    }
                }
            }
            many => {
                let mut rejected = Vec::new();
                let mut failures = Vec::new();
                for candidate in many {
                    let Some(command) = registry.get(&candidate.command_id) else {
                        continue;
                    };
                    self.handler_calls += 1;
                    match command.execute(node, &ctx) {
                        ExecutionResult::Valid(emission) => {
                            self.trace(&node.id, Some(command.id()), "valid");
                            return Ok(Resolution {
                                command_id: command.id().to_string(),
                                emission,
                                rejected,
                            });
                        }
                        ExecutionResult::Invalid => {
                            failures.push(format!("{}: invalid", command.id()));
                        }
                        ExecutionResult::Error(err) => {
                            // Recorded, then the next candidate is tried
                            tracing::warn!(
                                node_id = %node.id,
                                command_id = command.id(),
                                error = %err,
                                "candidate handler failed"
                            );
                            failures.push(format!("{}: {}", command.id(), err));
                        }
                    }
                    rejected.push(command.id().to_string());
                }
                self.trace(&node.id, None, "no_valid_candidate");
                Err(ConceptoError::NoValidCandidate {
                    node_id: node.id.clone(),
                    candidates: many.iter().map(|c| c.command_id.clone()).collect(),
                    failures,
                })
            }
        }
    }

    fn command(&self, id: &str) -> Result<&'r Command> {
        self.registry.get(id).ok_or_else(|| ConceptoError::Internal {
            message: format!("candidate {} vanished from registry", id),
        })
    }

    fn trace(&self, node_id: &str, command_id: Option<&str>, outcome: &str) {
        let command_id = command_id.unwrap_or("-");
        if self.debug {
            tracing::info!(node_id, command_id, outcome, "resolved node");
        } else {
            tracing::debug!(node_id, command_id, outcome, "resolved node");
        }
    }
}
