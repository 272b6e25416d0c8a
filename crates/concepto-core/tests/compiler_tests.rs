#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{page_registry, site_document, tag_command, CallCounter};
use concepto_core::{
    AbortHandle, Bundle, Command, CommandRegistry, CompileHooks, Compiler, CompilerConfig,
    ConceptoError, Document, Emission, ExecContext, HandlerError, MemorySink, Node, Reply,
    RequirementKind, RequirementSet, RunStatus, TreeNode,
};

#[test]
fn test_bundles_follow_document_order_with_trails() {
    let counter = CallCounter::default();
    let registry = page_registry(&counter, "1");
    let doc = site_document();

    let report = Compiler::new(&doc, &registry).run();

    assert_eq!(report.status, RunStatus::Success);
    let identities: Vec<&str> = report.bundles.iter().map(|b| b.identity.as_str()).collect();
    assert_eq!(identities, vec!["home", "gallery", "about"]);

    let home = report.bundle("home").unwrap();
    assert_eq!(
        home.code,
        "<page:home><text:welcome></text><text:hello there></text></page>"
    );
    assert_eq!(home.trail, vec!["page", "text", "text"]);
    assert_eq!(
        report.bundle("gallery").unwrap().trail,
        vec!["page", "image"]
    );
}

#[test]
fn test_child_error_halts_siblings_only_in_its_branch() {
    let counter = CallCounter::default();
    let mut registry = page_registry(&counter, "1");
    let later_sibling_calls = CallCounter::default();
    let seen = later_sibling_calls.clone();
    registry
        .register(
            Command::new(
                "text",
                RequirementSet::new().with(RequirementKind::Level, ">2"),
                move |node: &Node, _ctx: &ExecContext<'_>| {
                    if node.text == "welcome" {
                        return Err(HandlerError::here("cannot render welcome"));
                    }
                    if node.text == "hello there" {
                        seen.bump();
                    }
                    Ok(Emission::new().open(node.text.clone()).into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    let doc = site_document();

    let mut sink = MemorySink::default();
    let report = Compiler::new(&doc, &registry).with_sink(&mut sink).run();

    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(later_sibling_calls.get(), 0);
    assert!(!report.bundle("home").unwrap().is_valid());
    assert!(report.bundle("gallery").unwrap().is_valid());
    assert!(report.bundle("about").unwrap().is_valid());

    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert_eq!(error.node_id, "home.title");
    assert!(matches!(
        error.error,
        ConceptoError::HandlerFailed { ref location, .. } if location.is_some()
    ));
    // files are only written for error-free runs
    assert_eq!(sink.calls, 0);
}

#[test]
fn test_unmatched_node_fails_its_bundle() {
    let counter = CallCounter::default();
    let mut registry = CommandRegistry::default();
    registry
        .register(tag_command(
            "page",
            RequirementSet::new().with(RequirementKind::Level, "2"),
            &counter,
        ))
        .unwrap();
    let doc = site_document();

    let report = Compiler::new(&doc, &registry).run();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.errors.len(), 3);
    assert_eq!(report.errors[0].code(), "ERR_COMMAND_NOT_FOUND");
}

#[test]
fn test_abort_keeps_bundles_completed_before_it() {
    let counter = CallCounter::default();
    let mut registry = page_registry(&counter, "1");
    let abort = AbortHandle::new();
    let trigger = abort.clone();
    registry
        .register(
            Command::new(
                "page",
                RequirementSet::new().with(RequirementKind::Level, "2"),
                move |node: &Node, _ctx: &ExecContext<'_>| {
                    if node.id == "gallery" {
                        trigger.request();
                    }
                    Ok(Emission::new().open(node.text.clone()).into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    let doc = site_document();

    let mut sink = MemorySink::default();
    let report = Compiler::new(&doc, &registry)
        .with_abort(abort.clone())
        .with_sink(&mut sink)
        .run();

    assert_eq!(report.status, RunStatus::Partial);
    let identities: Vec<&str> = report.bundles.iter().map(|b| b.identity.as_str()).collect();
    assert_eq!(identities, vec!["home"]);
    assert!(report.errors.is_empty());

    // observed on the first child of the interrupted gallery bundle
    let abort = report.abort.as_ref().unwrap();
    assert_eq!(abort.code(), "ERR_ABORT_REQUESTED");
    assert_eq!(abort.identity, "gallery");
    assert_eq!(abort.node_id, "gallery.pic");
    assert_eq!(sink.calls, 0);
}

#[test]
fn test_branch_state_reaches_children_but_not_siblings() {
    let mut registry = CommandRegistry::default();
    registry
        .register(
            Command::new(
                "scope",
                RequirementSet::new().with(RequirementKind::Icons, "scope"),
                |node: &Node, _ctx: &ExecContext<'_>| {
                    Ok(Emission::new().state("scope", node.text.clone()).into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Command::new(
                "echo",
                RequirementSet::new(),
                |node: &Node, ctx: &ExecContext<'_>| {
                    let scope = ctx.branch.get_str("scope").unwrap_or("none");
                    Ok(Emission::new().open(format!("{}={};", node.text, scope)).into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    let doc = Document::from_tree(vec![TreeNode::new("root", "root").child(
        TreeNode::new("page", "page")
            .child(TreeNode::new("a", "a").icon("scope").child(TreeNode::new("a1", "a1")))
            .child(TreeNode::new("b", "b")),
    )])
    .unwrap();

    let report = Compiler::new(&doc, &registry).run();
    assert_eq!(
        report.bundle("page").unwrap().code,
        "page=none;a1=a;b=none;"
    );
}

#[test]
fn test_upward_state_flows_to_following_siblings() {
    let mut registry = CommandRegistry::default();
    registry
        .register(
            Command::new(
                "declare",
                RequirementSet::new().with(RequirementKind::TextContains, "declare"),
                |_node: &Node, _ctx: &ExecContext<'_>| {
                    Ok(Emission::new().upward("declared", true).into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Command::new(
                "use",
                RequirementSet::new(),
                |node: &Node, ctx: &ExecContext<'_>| {
                    let declared = ctx.branch.get("declared").is_some();
                    Ok(Emission::new().open(format!("{}:{};", node.text, declared)).into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    let doc = Document::from_tree(vec![TreeNode::new("root", "root").child(
        TreeNode::new("page", "page")
            .child(TreeNode::new("x", "before"))
            .child(TreeNode::new("d", "declare it"))
            .child(TreeNode::new("y", "after")),
    )])
    .unwrap();

    let report = Compiler::new(&doc, &registry).run();
    assert_eq!(
        report.bundle("page").unwrap().code,
        "page:false;before:false;after:true;"
    );
}

#[test]
fn test_global_state_persists_across_bundles() {
    let mut registry = CommandRegistry::default();
    registry
        .register(
            Command::new(
                "count",
                RequirementSet::new().with(RequirementKind::Level, "2"),
                |node: &Node, ctx: &ExecContext<'_>| {
                    let seen = ctx.global.get("pages").and_then(|v| v.as_u64()).unwrap_or(0);
                    Ok(Emission::new()
                        .open(format!("{}#{}", node.text, seen))
                        .global("pages", seen + 1)
                        .no_children()
                        .into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    let doc = site_document();

    let report = Compiler::new(&doc, &registry).run();
    let codes: Vec<&str> = report.bundles.iter().map(|b| b.code.as_str()).collect();
    assert_eq!(codes, vec!["home#0", "gallery#1", "about#2"]);
    assert_eq!(report.global.get("pages"), Some(&serde_json::json!(3)));
}

#[test]
fn test_losing_candidates_leave_no_trace() {
    let mut registry = CommandRegistry::default();
    registry
        .register(
            Command::new(
                "picky",
                RequirementSet::new().with_priority(10),
                |_node: &Node, _ctx: &ExecContext<'_>| Ok(Reply::Invalid),
            )
            .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Command::new(
                "fallback",
                RequirementSet::new(),
                |node: &Node, _ctx: &ExecContext<'_>| {
                    Ok(Emission::new().open(node.text.clone()).no_children().into())
                },
            )
            .unwrap(),
        )
        .unwrap();
    let doc = site_document();

    let report = Compiler::new(&doc, &registry).run();
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.bundle("home").unwrap().trail, vec!["fallback"]);
}

#[derive(Default)]
struct RecordingHooks {
    prepared: bool,
    errors: Vec<String>,
    completed: Vec<String>,
}

impl CompileHooks for RecordingHooks {
    fn prepare(&mut self) {
        self.prepared = true;
    }

    fn define_filename(&self, node: &Node) -> String {
        format!("{}.vue", node.text)
    }

    fn complete_code_template(&mut self, bundle: &mut Bundle) {
        bundle.code = format!("<template>{}</template>", bundle.code);
        self.completed.push(bundle.identity.clone());
    }

    fn on_errors(&mut self, errors: &[String]) {
        self.errors.extend(errors.iter().cloned());
    }
}

#[test]
fn test_hooks_shape_bundles() {
    let counter = CallCounter::default();
    let registry = page_registry(&counter, "1");
    let doc = site_document();

    let mut hooks = RecordingHooks::default();
    let report = Compiler::new(&doc, &registry)
        .with_hooks(&mut hooks)
        .with_config(CompilerConfig {
            use_cache: false,
            ..Default::default()
        })
        .run();

    assert!(hooks.prepared);
    assert!(hooks.errors.is_empty());
    assert_eq!(hooks.completed, vec!["home", "gallery", "about"]);
    let about = report.bundle("about").unwrap();
    assert_eq!(about.file, "about.vue");
    assert!(about.code.starts_with("<template><page:about>"));
}
