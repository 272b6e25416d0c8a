use concepto_core::{
    Command, CommandMeta, CommandRegistry, Document, Emission, ExecContext, LibraryMeta, Node,
    RequirementKind, RequirementSet, TreeNode,
};

/// A small form application: one page holding a form with two fields
#[allow(dead_code)]
pub fn app_document() -> Document {
    Document::from_tree(vec![TreeNode::new("app", "shop")
        .child(
            TreeNode::new("checkout", "checkout").child(
                TreeNode::new("checkout.form", "form")
                    .icon("list")
                    .child(TreeNode::new("checkout.name", "name"))
                    .child(TreeNode::new("checkout.card", "card")),
            ),
        )
        .child(TreeNode::new("help", "help").child(TreeNode::new("help.text", "faq")))])
    .unwrap()
}

/// Page, form, field and paragraph commands; `field` watches `theme`
#[allow(dead_code)]
pub fn app_registry(field_revision: &str) -> CommandRegistry {
    let mut registry = CommandRegistry::new(LibraryMeta::new("forms", "1.0.0"));
    registry
        .register(
            Command::new(
                "page",
                RequirementSet::new().with(RequirementKind::Level, "2"),
                |node: &Node, _ctx: &ExecContext<'_>| {
                    Ok(Emission::new()
                        .open(format!("<page {}>", node.text))
                        .close("</page>")
                        .into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Command::new(
                "form",
                RequirementSet::new()
                    .with(RequirementKind::Level, "3")
                    .with(RequirementKind::Icons, "list"),
                |_node: &Node, _ctx: &ExecContext<'_>| {
                    Ok(Emission::new().open("<form>").close("</form>").into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Command::new(
                "field",
                RequirementSet::new()
                    .with(RequirementKind::Level, "4")
                    .with(RequirementKind::OrHasParent, "form"),
                |node: &Node, _ctx: &ExecContext<'_>| {
                    Ok(Emission::new().open(format!("<input {}/>", node.text)).into())
                },
            )
            .unwrap()
            .with_meta(CommandMeta {
                revision: field_revision.to_string(),
                watch_values: vec!["theme".to_string()],
                ..Default::default()
            }),
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
