use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{ConceptoError, Result};
use crate::registry::RequirementSet;

/// Requirement kinds a command may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementKind {
    Icons,
    NotIcons,
    NotEmpty,
    NotTextContains,
    Empty,
    TextIs,
    TextContains,
    TextPattern,
    Level,
    OrHasParent,
    AllHasParent,
    OrIsParent,
}

impl RequirementKind {
    pub const ALL: [RequirementKind; 12] = [
        RequirementKind::Icons,
        RequirementKind::NotIcons,
        RequirementKind::NotEmpty,
        RequirementKind::NotTextContains,
        RequirementKind::Empty,
        RequirementKind::TextIs,
        RequirementKind::TextContains,
        RequirementKind::TextPattern,
        RequirementKind::Level,
        RequirementKind::OrHasParent,
        RequirementKind::AllHasParent,
        RequirementKind::OrIsParent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RequirementKind::Icons => "icons",
            RequirementKind::NotIcons => "not_icons",
            RequirementKind::NotEmpty => "not_empty",
            RequirementKind::NotTextContains => "not_text_contains",
            RequirementKind::Empty => "empty",
            RequirementKind::TextIs => "text_is",
            RequirementKind::TextContains => "text_contains",
            RequirementKind::TextPattern => "text_pattern",
            RequirementKind::Level => "level",
            RequirementKind::OrHasParent => "or_has_parent",
            RequirementKind::AllHasParent => "all_has_parent",
            RequirementKind::OrIsParent => "or_is_parent",
        }
    }

    /// Relational kinds depend on the resolved commands of other nodes
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            RequirementKind::OrHasParent | RequirementKind::AllHasParent | RequirementKind::OrIsParent
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconFilter {
    /// `*`: the node must carry no icon at all
    Any,
    AnyOf(Vec<String>),
}

/// One term of a path spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    /// Dotted struct path such as `cloud.bgcolor`
    Path(Vec<String>),
    /// `collection[key1,key2]`: every key must be present in the collection
    Contains { collection: String, keys: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    AnyOf(Vec<String>),
    AllOf(Vec<String>),
    /// Lowercased needle
    Insensitive(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelBound {
    Gt(u32),
    Lt(u32),
    Ge(u32),
    Le(u32),
}

impl LevelBound {
    pub fn accepts(&self, level: u32) -> bool {
        match *self {
            LevelBound::Gt(n) => level > n,
            LevelBound::Lt(n) => level < n,
            LevelBound::Ge(n) => level >= n,
            LevelBound::Le(n) => level <= n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelCondition {
    OneOf(Vec<u32>),
    AllOf(Vec<LevelBound>),
}

impl LevelCondition {
    pub fn accepts(&self, level: u32) -> bool {
        match self {
            LevelCondition::OneOf(values) => values.contains(&level),
            LevelCondition::AllOf(bounds) => bounds.iter().all(|b| b.accepts(level)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    RequiredIcons(Vec<String>),
    ForbiddenIcons(IconFilter),
    NonEmpty(Vec<FieldSpec>),
    ForbiddenText(Vec<String>),
    Empty(Vec<FieldSpec>),
    TextIs(String),
    TextContains(TextMatch),
    Glob { patterns: Vec<String>, set: GlobSet },
    Level(LevelCondition),
    AnyAncestorIs(Vec<String>),
    AllAncestorsInclude(Vec<String>),
    ExactParentIs(Vec<String>),
}

impl Predicate {
    pub fn kind(&self) -> RequirementKind {
        match self {
            Predicate::RequiredIcons(_) => RequirementKind::Icons,
            Predicate::ForbiddenIcons(_) => RequirementKind::NotIcons,
            Predicate::NonEmpty(_) => RequirementKind::NotEmpty,
            Predicate::ForbiddenText(_) => RequirementKind::NotTextContains,
            Predicate::Empty(_) => RequirementKind::Empty,
            Predicate::TextIs(_) => RequirementKind::TextIs,
            Predicate::TextContains(_) => RequirementKind::TextContains,
            Predicate::Glob { .. } => RequirementKind::TextPattern,
            Predicate::Level(_) => RequirementKind::Level,
            Predicate::AnyAncestorIs(_) => RequirementKind::OrHasParent,
            Predicate::AllAncestorsInclude(_) => RequirementKind::AllHasParent,
            Predicate::ExactParentIs(_) => RequirementKind::OrIsParent,
        }
    }
}

/// Typed form of a command's requirement set
#[derive(Debug, Clone)]
pub struct CompiledRequirements {
    /// Node-local predicates first, relational ones last
    pub predicates: Vec<Predicate>,
    /// Number of declared requirement kinds
    pub specificity: u32,
    /// Explicit rank override
    pub priority: Option<i64>,
}

impl CompiledRequirements {
    /// Parse a requirement set
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequirement` for malformed level, glob or path specs.
    pub fn compile(command_id: &str, req: &RequirementSet) -> Result<Self> {
        let mut local = Vec::new();
        let mut relational = Vec::new();

        for kind in RequirementKind::ALL {
            let raw = req.value(kind).trim();
            if raw.is_empty() {
                continue;
            }
            let invalid = |reason: String| ConceptoError::InvalidRequirement {
                command_id: command_id.to_string(),
                kind: kind.name().to_string(),
                reason,
            };
            let predicate = match kind {
                RequirementKind::Icons => Predicate::RequiredIcons(split_list(raw, &[','])),
                RequirementKind::NotIcons => {
                    if raw == "*" {
                        Predicate::ForbiddenIcons(IconFilter::Any)
                    } else {
                        Predicate::ForbiddenIcons(IconFilter::AnyOf(split_list(raw, &[','])))
                    }
                }
                RequirementKind::NotEmpty => Predicate::NonEmpty(parse_paths(raw).map_err(invalid)?),
                RequirementKind::NotTextContains => {
                    Predicate::ForbiddenText(split_list(raw, &[',']))
                }
                RequirementKind::Empty => Predicate::Empty(parse_paths(raw).map_err(invalid)?),
                // Exact text keeps surrounding whitespace
                RequirementKind::TextIs => Predicate::TextIs(req.value(kind).to_string()),
                RequirementKind::TextContains => Predicate::TextContains(parse_text_match(raw)),
                RequirementKind::TextPattern => parse_glob(raw).map_err(invalid)?,
                RequirementKind::Level => Predicate::Level(parse_level(raw).map_err(invalid)?),
                RequirementKind::OrHasParent => {
                    Predicate::AnyAncestorIs(split_list(raw, &[',']))
                }
                RequirementKind::AllHasParent => {
                    Predicate::AllAncestorsInclude(split_list(raw, &[',']))
                }
                RequirementKind::OrIsParent => Predicate::ExactParentIs(split_list(raw, &[','])),
            };
            if kind.is_relational() {
                relational.push(predicate);
            } else {
                local.push(predicate);
            }
        }

        let specificity = (local.len() + relational.len()) as u32;
        local.extend(relational);
        Ok(Self {
            predicates: local,
            specificity,
            priority: req.priority,
        })
    }

    /// Effective rank score: the explicit override, else specificity
    ///
    /// Both land on the same scale; see [`RequirementSet::priority`].
    pub fn rank_score(&self) -> i64 {
        self.priority.unwrap_or(i64::from(self.specificity))
    }

    pub fn has_relational(&self) -> bool {
        self.predicates.iter().any(|p| p.kind().is_relational())
    }
}

fn split_list(raw: &str, separators: &[char]) -> Vec<String> {
    raw.split(|c| separators.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_text_match(raw: &str) -> TextMatch {
    if raw.contains('|') {
        TextMatch::AnyOf(split_list(raw, &['|']))
    } else if raw.contains(',') {
        TextMatch::AllOf(split_list(raw, &[',']))
    } else {
        TextMatch::Insensitive(raw.to_lowercase())
    }
}

fn parse_glob(raw: &str) -> std::result::Result<Predicate, String> {
    let patterns = split_list(raw, &['|']);
    let mut builder = GlobSetBuilder::new();
    for pattern in &patterns {
        let glob = Glob::new(pattern).map_err(|e| format!("bad glob '{}': {}", pattern, e))?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| e.to_string())?;
    Ok(Predicate::Glob { patterns, set })
}

fn parse_level(raw: &str) -> std::result::Result<LevelCondition, String> {
    let mut exact = Vec::new();
    let mut bounds = Vec::new();

    for term in raw.split(',').map(str::trim) {
        if term.is_empty() {
            return Err("empty level term".to_string());
        }
        let (op, digits) = [">=", "<=", ">", "<"]
            .iter()
            .find_map(|op| term.strip_prefix(*op).map(|rest| (*op, rest)))
            .unwrap_or(("", term));
        let value: u32 = digits
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a level term", term))?;
        match op {
            ">=" => bounds.push(LevelBound::Ge(value)),
            "<=" => bounds.push(LevelBound::Le(value)),
            ">" => bounds.push(LevelBound::Gt(value)),
            "<" => bounds.push(LevelBound::Lt(value)),
            _ => exact.push(value),
        }
    }

    match (exact.is_empty(), bounds.is_empty()) {
        (false, true) => Ok(LevelCondition::OneOf(exact)),
        (true, false) => Ok(LevelCondition::AllOf(bounds)),
        _ => Err("exact values and bounds cannot be mixed".to_string()),
    }
}

/// Parse a compound path spec such as `attributes[src+alt],cloud.bgcolor`
fn parse_paths(raw: &str) -> std::result::Result<Vec<FieldSpec>, String> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for c in raw.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced ']' in '{}'", raw))?;
                current.push(c);
            }
            ',' | '+' if depth == 0 => terms.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err(format!("unclosed '[' in '{}'", raw));
    }
    terms.push(current);

    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(parse_path_term)
        .collect()
}

fn parse_path_term(term: &str) -> std::result::Result<FieldSpec, String> {
    if let Some(open) = term.find('[') {
        let collection = term[..open].trim();
        let inner = term[open + 1..]
            .strip_suffix(']')
            .ok_or_else(|| format!("'{}' must end with ']'", term))?;
        if collection.is_empty() || inner.contains('[') {
            return Err(format!("malformed collection term '{}'", term));
        }
        let keys = split_list(inner, &[',', '+']);
        if keys.is_empty() {
            return Err(format!("collection term '{}' lists no keys", term));
        }
        return Ok(FieldSpec::Contains {
            collection: collection.to_string(),
            keys,
        });
    }

    let segments: Vec<String> = term.split('.').map(|s| s.trim().to_string()).collect();
    if segments.iter().any(String::is_empty) {
        return Err(format!("malformed path '{}'", term));
    }
    Ok(FieldSpec::Path(segments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> RequirementSet {
        RequirementSet::default()
    }

    #[test]
    fn test_specificity_counts_declared_kinds() {
        let r = RequirementSet {
            icons: "idea".to_string(),
            level: "2".to_string(),
            or_is_parent: "def_page".to_string(),
            ..req()
        };
        let compiled = CompiledRequirements::compile("c", &r).unwrap();
        assert_eq!(compiled.specificity, 3);
        assert_eq!(compiled.rank_score(), 3);
        // relational predicate goes last
        assert_eq!(
            compiled.predicates.last().map(Predicate::kind),
            Some(RequirementKind::OrIsParent)
        );
    }

    #[test]
    fn test_blank_values_are_not_declared() {
        let r = RequirementSet {
            icons: "   ".to_string(),
            ..req()
        };
        let compiled = CompiledRequirements::compile("c", &r).unwrap();
        assert_eq!(compiled.specificity, 0);
        assert!(compiled.predicates.is_empty());
    }

    #[test]
    fn test_priority_overrides_rank() {
        let r = RequirementSet {
            icons: "idea".to_string(),
            priority: Some(-5),
            ..req()
        };
        let compiled = CompiledRequirements::compile("c", &r).unwrap();
        assert_eq!(compiled.rank_score(), -5);
    }

    #[test]
    fn test_priority_shares_the_specificity_scale() {
        let low_priority = RequirementSet {
            icons: "idea".to_string(),
            priority: Some(1),
            ..req()
        };
        let specific = RequirementSet {
            icons: "idea".to_string(),
            level: "2".to_string(),
            ..req()
        };
        let low_priority = CompiledRequirements::compile("a", &low_priority).unwrap();
        let specific = CompiledRequirements::compile("b", &specific).unwrap();
        assert!(specific.rank_score() > low_priority.rank_score());
    }

    #[test]
    fn test_parse_level_forms() {
        assert_eq!(parse_level("5").unwrap(), LevelCondition::OneOf(vec![5]));
        assert_eq!(
            parse_level("2, 3,4").unwrap(),
            LevelCondition::OneOf(vec![2, 3, 4])
        );
        assert_eq!(
            parse_level(">2,<=6").unwrap(),
            LevelCondition::AllOf(vec![LevelBound::Gt(2), LevelBound::Le(6)])
        );
        assert!(parse_level(">2,4").is_err());
        assert!(parse_level("abc").is_err());
        assert!(parse_level("2,,3").is_err());
    }

    #[test]
    fn test_parse_paths() {
        let specs = parse_paths("attributes[src+alt],cloud.bgcolor+text_note").unwrap();
        assert_eq!(
            specs,
            vec![
                FieldSpec::Contains {
                    collection: "attributes".to_string(),
                    keys: vec!["src".to_string(), "alt".to_string()],
                },
                FieldSpec::Path(vec!["cloud".to_string(), "bgcolor".to_string()]),
                FieldSpec::Path(vec!["text_note".to_string()]),
            ]
        );
        assert!(parse_paths("attributes[src").is_err());
        assert!(parse_paths("attributes]").is_err());
        assert!(parse_paths("cloud..bgcolor").is_err());
        assert!(parse_paths("attributes[]").is_err());
    }

    #[test]
    fn test_text_match_forms() {
        assert_eq!(
            parse_text_match("a|b"),
            TextMatch::AnyOf(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            parse_text_match("a,b"),
            TextMatch::AllOf(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            parse_text_match("Hello"),
            TextMatch::Insensitive("hello".to_string())
        );
    }

    #[test]
    fn test_invalid_level_is_registration_error() {
        let r = RequirementSet {
            level: ">x".to_string(),
            ..req()
        };
        let err = CompiledRequirements::compile("bad", &r).unwrap_err();
        assert!(matches!(
            err,
            ConceptoError::InvalidRequirement { ref command_id, ref kind, .. }
                if command_id == "bad" && kind == "level"
        ));
    }
}
