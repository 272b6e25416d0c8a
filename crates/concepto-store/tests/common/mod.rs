use concepto_core::{
    Command, CommandRegistry, Document, Emission, ExecContext, LibraryMeta, Node,
    RequirementKind, RequirementSet, TreeNode,
};

/// Two pages with one paragraph each
#[allow(dead_code)]
pub fn notes_document() -> Document {
    Document::from_tree(vec![TreeNode::new("root", "notes")
        .child(TreeNode::new("intro", "intro").child(TreeNode::new("intro.p", "hello")))
        .child(TreeNode::new("outro", "outro").child(TreeNode::new("outro.p", "bye")))])
    .unwrap()
}

/// Registry with a section command for level 2 and a paragraph command below
#[allow(dead_code)]
pub fn notes_registry(version: &str) -> CommandRegistry {
    let mut registry = CommandRegistry::new(LibraryMeta::new("notes-lib", version));
    registry
        .register(
            Command::new(
                "section",
                RequirementSet::new().with(RequirementKind::Level, "2"),
                |node: &Node, _ctx: &ExecContext<'_>| {
                    Ok(Emission::new()
                        .open(format!("<section id=\"{}\">", node.id))
                        .close("</section>")
                        .global("sections", serde_json::json!(node.id))
                        .into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Command::new(
                "paragraph",
                RequirementSet::new().with(RequirementKind::Level, ">2"),
                |node: &Node, _ctx: &ExecContext<'_>| {
                    Ok(Emission::new().open(format!("<p>{}</p>", node.text)).into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    registry
}
