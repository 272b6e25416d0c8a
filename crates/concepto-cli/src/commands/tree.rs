//! Document tree listing

use clap::Args;
use concepto_core::{Document, DocumentQuery, Node};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// JSON document (one root object or an array of roots)
    pub doc: PathBuf,

    /// Only list nodes at this level
    #[arg(long)]
    pub level: Option<u32>,

    /// Show full content hashes instead of a 12 character prefix
    #[arg(long)]
    pub full_hash: bool,
}

pub fn execute(args: TreeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&args.doc)?;
    let doc = Document::from_json(&text)?;

    for node in doc.iter() {
        if args.level.is_some_and(|l| l != node.level) {
            continue;
        }
        println!("{}", format_line(&doc, node, args.level.is_none(), args.full_hash));
    }
    Ok(())
}

fn format_line(doc: &Document, node: &Node, indent: bool, full_hash: bool) -> String {
    let depth = if indent {
        doc.get_parent_node_ids(&node.id).len()
    } else {
        0
    };
    let hash = if full_hash {
        node.content_hash.as_str()
    } else {
        node.content_hash
            .get(..12)
            .unwrap_or(node.content_hash.as_str())
    };
    let mut line = format!(
        "{}{} [{}] L{} {}",
        "  ".repeat(depth),
        node.text,
        node.id,
        node.level,
        hash
    );
    if !node.icons.is_empty() {
        line.push_str(&format!(" icons={}", node.icons.join(",")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use concepto_core::TreeNode;

    #[test]
    fn test_format_line_indents_by_depth() {
        let doc = Document::from_tree(vec![TreeNode::new("r", "root")
            .child(TreeNode::new("c", "child").icon("image"))])
        .unwrap();
        let child = doc.node("c").unwrap();

        let line = format_line(&doc, child, true, false);
        assert!(line.starts_with("  child [c] L2 "));
        assert!(line.ends_with(" icons=image"));
        assert_eq!(format_line(&doc, child, false, false).find("child"), Some(0));
    }
}
