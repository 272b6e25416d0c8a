//! Compilation lifecycle hooks and the artifact sink

use crate::compiler::Bundle;
use crate::errors::Result;
use crate::model::Node;

/// Callbacks around the compilation of top-level bundles
///
/// Every method has a default, so implementors override only what they
/// need.
pub trait CompileHooks {
    /// Called once before the first top-level node
    fn prepare(&mut self) {}

    /// Title of a bundle: the `title` or `titulo` attribute, else the text
    fn define_title(&self, node: &Node) -> String {
        node.attribute("title")
            .or_else(|| node.attribute("titulo"))
            .unwrap_or(&node.text)
            .to_string()
    }

    fn define_filename(&self, node: &Node) -> String {
        node.text.clone()
    }

    fn define_node_name(&self, node: &Node) -> String {
        node.text.replace(' ', "_")
    }

    /// Called for every top-level bundle once its subtree was compiled
    fn after_process(&mut self, _bundle: &mut Bundle) {}

    /// Called after `after_process`
    fn complete_code_template(&mut self, _bundle: &mut Bundle) {}

    /// Error-collection hook, called once per failed branch
    fn on_errors(&mut self, _errors: &[String]) {}
}

/// Hooks with every default behaviour
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl CompileHooks for DefaultHooks {}

/// Receives the bundles of a run that finished without errors
pub trait ArtifactSink {
    /// # Errors
    ///
    /// Returns `ArtifactSink` if the bundles cannot be written.
    fn create_files(&mut self, bundles: &[Bundle]) -> Result<()>;
}

/// Sink keeping the bundles in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub bundles: Vec<Bundle>,
    pub calls: usize,
}

impl ArtifactSink for MemorySink {
    fn create_files(&mut self, bundles: &[Bundle]) -> Result<()> {
        self.calls += 1;
        self.bundles = bundles.to_vec();
        Ok(())
    }
}
