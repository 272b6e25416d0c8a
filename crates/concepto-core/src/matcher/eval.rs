use super::predicate::{FieldSpec, IconFilter, Predicate, TextMatch};
use crate::model::Node;

/// Evaluate a node-local predicate
///
/// Returns `None` for relational predicates, which need resolved commands
/// of other nodes.
pub fn matches_local(predicate: &Predicate, node: &Node) -> Option<bool> {
    let matched = match predicate {
        Predicate::RequiredIcons(icons) => icons.iter().all(|i| node.has_icon(i)),
        Predicate::ForbiddenIcons(IconFilter::Any) => node.icons.is_empty(),
        Predicate::ForbiddenIcons(IconFilter::AnyOf(icons)) => {
            !icons.iter().any(|i| node.has_icon(i))
        }
        Predicate::NonEmpty(specs) => specs.iter().all(|s| field_spec_is_set(s, node)),
        Predicate::ForbiddenText(words) => !words.iter().any(|w| node.text.contains(w.as_str())),
        Predicate::Empty(specs) => specs.iter().all(|s| field_spec_is_empty(s, node)),
        Predicate::TextIs(text) => node.text == *text,
        Predicate::TextContains(TextMatch::AnyOf(words)) => {
            words.iter().any(|w| node.text.contains(w.as_str()))
        }
        Predicate::TextContains(TextMatch::AllOf(words)) => {
            words.iter().all(|w| node.text.contains(w.as_str()))
        }
        Predicate::TextContains(TextMatch::Insensitive(needle)) => {
            node.text.to_lowercase().contains(needle.as_str())
        }
        Predicate::Glob { set, .. } => set.is_match(node.text.trim()),
        Predicate::Level(condition) => condition.accepts(node.level),
        Predicate::AnyAncestorIs(_)
        | Predicate::AllAncestorsInclude(_)
        | Predicate::ExactParentIs(_) => return None,
    };
    Some(matched)
}

/// Whether a path term is present and non-empty on the node
pub fn field_spec_is_set(spec: &FieldSpec, node: &Node) -> bool {
    match spec {
        FieldSpec::Path(path) => !node.field(path).is_empty(),
        FieldSpec::Contains { collection, keys } => match node.collection_keys(collection) {
            Some(present) => keys.iter().all(|k| present.contains(&k.as_str())),
            None => false,
        },
    }
}

/// Whether a path term is empty on the node
///
/// A collection term is empty when none of its keys are present.
pub fn field_spec_is_empty(spec: &FieldSpec, node: &Node) -> bool {
    match spec {
        FieldSpec::Path(path) => node.field(path).is_empty(),
        FieldSpec::Contains { collection, keys } => match node.collection_keys(collection) {
            Some(present) => !keys.iter().any(|k| present.contains(&k.as_str())),
            None => true,
        },
    }
}
