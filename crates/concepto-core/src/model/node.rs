use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cloud decoration of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cloud {
    pub used: bool,
    pub bgcolor: String,
}

/// Font settings of a node's text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Font {
    pub face: String,
    pub size: String,
    pub bold: bool,
    pub italic: bool,
}

/// Visual connection from a node to another node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Arrow {
    pub target: String,
    pub color: String,
    pub style: String,
}

/// One element of the parsed hierarchical document
///
/// Nodes are owned by the document; the engine only ever reads them.
/// `children` holds child node ids in document order and `content_hash`
/// fingerprints the node together with its whole subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    pub id: String,
    pub level: u32,
    pub text: String,
    pub text_note: String,
    pub text_rich: String,
    pub image: String,
    pub link: String,
    pub color: String,
    pub bgcolor: String,
    pub style: String,
    pub position: String,
    pub cloud: Cloud,
    pub font: Font,
    pub arrows: Vec<Arrow>,
    pub icons: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<String>,
    pub content_hash: String,
}

/// Value found at a field path of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Missing,
    Text(&'a str),
    Bool(bool),
    Number(u32),
    /// Collection field, carrying its length
    Len(usize),
}

impl FieldValue<'_> {
    /// Missing, `""`, `false` and empty collections are empty
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Bool(b) => !b,
            FieldValue::Number(_) => false,
            FieldValue::Len(n) => *n == 0,
        }
    }
}

impl Node {
    pub fn new(id: impl Into<String>, level: u32, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            level,
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn has_icon(&self, icon: &str) -> bool {
        self.icons.iter().any(|i| i == icon)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Look up a dotted field path such as `cloud.bgcolor` or `attributes.src`
    pub fn field<S: AsRef<str>>(&self, path: &[S]) -> FieldValue<'_> {
        let segments: Vec<&str> = path.iter().map(AsRef::as_ref).collect();
        match segments.as_slice() {
            ["id"] => FieldValue::Text(&self.id),
            ["level"] => FieldValue::Number(self.level),
            ["text"] => FieldValue::Text(&self.text),
            ["text_note"] => FieldValue::Text(&self.text_note),
            ["text_rich"] => FieldValue::Text(&self.text_rich),
            ["image"] => FieldValue::Text(&self.image),
            ["link"] => FieldValue::Text(&self.link),
            ["color"] => FieldValue::Text(&self.color),
            ["bgcolor"] => FieldValue::Text(&self.bgcolor),
            ["style"] => FieldValue::Text(&self.style),
            ["position"] => FieldValue::Text(&self.position),
            ["cloud"] | ["cloud", "used"] => FieldValue::Bool(self.cloud.used),
            ["cloud", "bgcolor"] => FieldValue::Text(&self.cloud.bgcolor),
            ["font", "face"] => FieldValue::Text(&self.font.face),
            ["font", "size"] => FieldValue::Text(&self.font.size),
            ["font", "bold"] => FieldValue::Bool(self.font.bold),
            ["font", "italic"] => FieldValue::Bool(self.font.italic),
            ["icons"] => FieldValue::Len(self.icons.len()),
            ["arrows"] => FieldValue::Len(self.arrows.len()),
            ["attributes"] => FieldValue::Len(self.attributes.len()),
            ["attributes", key] => self
                .attributes
                .get(*key)
                .map(|v| FieldValue::Text(v))
                .unwrap_or(FieldValue::Missing),
            ["children"] | ["nodes"] => FieldValue::Len(self.children.len()),
            _ => FieldValue::Missing,
        }
    }

    /// Keys present in a keyed collection (`attributes` or `arrows`)
    ///
    /// For arrows these are the names of non-empty arrow fields across all
    /// arrows of the node.
    pub fn collection_keys(&self, collection: &str) -> Option<Vec<&str>> {
        match collection {
            "attributes" => Some(self.attributes.keys().map(String::as_str).collect()),
            "arrows" => {
                let mut keys = Vec::new();
                for arrow in &self.arrows {
                    for (name, value) in [
                        ("target", &arrow.target),
                        ("color", &arrow.color),
                        ("style", &arrow.style),
                    ] {
                        if !value.is_empty() && !keys.contains(&name) {
                            keys.push(name);
                        }
                    }
                }
                Some(keys)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup_struct_paths() {
        let mut node = Node::new("n1", 3, "hello");
        node.cloud.bgcolor = "#fff".to_string();
        node.attributes.insert("src".to_string(), "a.png".to_string());

        assert_eq!(node.field(&["cloud", "bgcolor"]), FieldValue::Text("#fff"));
        assert_eq!(node.field(&["cloud", "used"]), FieldValue::Bool(false));
        assert_eq!(node.field(&["attributes", "src"]), FieldValue::Text("a.png"));
        assert_eq!(node.field(&["attributes", "alt"]), FieldValue::Missing);
        assert_eq!(node.field(&["level"]), FieldValue::Number(3));
        assert_eq!(node.field(&["unknown"]), FieldValue::Missing);
    }

    #[test]
    fn test_field_value_emptiness() {
        assert!(FieldValue::Missing.is_empty());
        assert!(FieldValue::Text("").is_empty());
        assert!(FieldValue::Bool(false).is_empty());
        assert!(FieldValue::Len(0).is_empty());
        assert!(!FieldValue::Number(0).is_empty());
        assert!(!FieldValue::Text("x").is_empty());
    }

    #[test]
    fn test_collection_keys_for_arrows() {
        let mut node = Node::new("n1", 2, "x");
        node.arrows.push(Arrow {
            target: "n2".to_string(),
            color: String::new(),
            style: "both".to_string(),
        });
        let keys = node.collection_keys("arrows").unwrap();
        assert_eq!(keys, vec!["target", "style"]);
        assert!(node.collection_keys("icons").is_none());
    }
}
