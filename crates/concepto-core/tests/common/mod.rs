use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use concepto_core::{
    Command, CommandMeta, CommandRegistry, Document, Emission, ExecContext, LibraryMeta, Node,
    RequirementKind, RequirementSet, TreeNode,
};

/// Shared handler invocation counter
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct CallCounter(Arc<AtomicUsize>);

#[allow(dead_code)]
impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

/// Command emitting `<id:text>` around its children, counting invocations
#[allow(dead_code)]
pub fn tag_command(id: &'static str, req: RequirementSet, counter: &CallCounter) -> Command {
    let counter = counter.clone();
    Command::new(id, req, move |node: &Node, _ctx: &ExecContext<'_>| {
        counter.bump();
        Ok(Emission::new()
            .open(format!("<{}:{}>", id, node.text))
            .close(format!("</{}>", id))
            .into())
    })
    .unwrap()
}

/// Registry with a page command for level 2 and a text command below it
#[allow(dead_code)]
pub fn page_registry(counter: &CallCounter, page_revision: &str) -> CommandRegistry {
    let mut registry = CommandRegistry::new(LibraryMeta::new("test-lib", "1.0.0"));
    registry
        .register(
            tag_command(
                "page",
                RequirementSet::new().with(RequirementKind::Level, "2"),
                counter,
            )
            .with_meta(CommandMeta {
                revision: page_revision.to_string(),
                ..Default::default()
            }),
        )
        .unwrap();
    registry
        .register(tag_command(
            "text",
            RequirementSet::new().with(RequirementKind::Level, ">2"),
            counter,
        ))
        .unwrap();
    registry
        .register(tag_command(
            "image",
            RequirementSet::new()
                .with(RequirementKind::Level, ">2")
                .with(RequirementKind::Icons, "image"),
            counter,
        ))
        .unwrap();
    registry
}

/// Three top-level pages; only `gallery` uses the image command
#[allow(dead_code)]
pub fn site_document() -> Document {
    Document::from_tree(vec![TreeNode::new("root", "site")
        .child(
            TreeNode::new("home", "home")
                .child(TreeNode::new("home.title", "welcome"))
                .child(TreeNode::new("home.body", "hello there")),
        )
        .child(
            TreeNode::new("gallery", "gallery")
                .child(TreeNode::new("gallery.pic", "sunset").icon("image")),
        )
        .child(TreeNode::new("about", "about").child(TreeNode::new("about.text", "us")))])
    .unwrap()
}
