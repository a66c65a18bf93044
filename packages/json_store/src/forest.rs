//! The in-memory shape of a whole store: two scope trees of nodes.
//!
//! Navigation follows a prefix-trie layout keyed by node name, so every
//! lookup is O(depth). The same types serialize as the JSON document the
//! file store persists.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use preftree_core_store::{NodePath, Scope, TypedValue};

/// A stored entry. Every non-byte type lives in the text slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SlotRepr", try_from = "SlotRepr")]
pub enum Slot {
    Text(String),
    Bytes(Vec<u8>),
}

impl Slot {
    pub fn raw_text(&self) -> String {
        match self {
            Slot::Text(s) => s.clone(),
            Slot::Bytes(b) => BASE64.encode(b),
        }
    }
}

impl From<TypedValue> for Slot {
    fn from(value: TypedValue) -> Self {
        match value {
            TypedValue::ByteSequence(bytes) => Slot::Bytes(bytes),
            other => Slot::Text(other.to_raw_text()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SlotRepr {
    Text(String),
    Bytes(String),
}

impl From<Slot> for SlotRepr {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Text(s) => SlotRepr::Text(s),
            Slot::Bytes(b) => SlotRepr::Bytes(BASE64.encode(b)),
        }
    }
}

impl TryFrom<SlotRepr> for Slot {
    type Error = String;

    fn try_from(repr: SlotRepr) -> Result<Self, Self::Error> {
        match repr {
            SlotRepr::Text(s) => Ok(Slot::Text(s)),
            SlotRepr::Bytes(encoded) => BASE64
                .decode(&encoded)
                .map(Slot::Bytes)
                .map_err(|e| format!("invalid base64 in byte slot: {}", e)),
        }
    }
}

/// One node: its entries and its named children.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entries: BTreeMap<String, Slot>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, NodeData>,
}

impl NodeData {
    pub fn get(&self, path: &NodePath) -> Option<&NodeData> {
        let mut current = self;
        for segment in path.iter() {
            current = current.children.get(segment)?;
        }
        Some(current)
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut NodeData> {
        let mut current = self;
        for segment in path.iter() {
            current = current.children.get_mut(segment)?;
        }
        Some(current)
    }

    /// Navigate to a node, creating intermediate nodes as needed.
    pub fn get_or_create(&mut self, path: &NodePath) -> &mut NodeData {
        let mut current = self;
        for segment in path.iter() {
            current = current.children.entry(segment.clone()).or_default();
        }
        current
    }

    /// Detach and return the subtree at a non-root path.
    pub fn remove_subtree(&mut self, path: &NodePath) -> Option<NodeData> {
        let name = path.name()?;
        let parent = self.get_mut(&path.parent()?)?;
        parent.children.remove(name)
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(NodeData::node_count).sum::<usize>()
    }
}

/// Both scope trees.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forest {
    #[serde(rename = "User", default)]
    pub user: NodeData,
    #[serde(rename = "System", default)]
    pub system: NodeData,
}

impl Forest {
    pub fn scope(&self, scope: Scope) -> &NodeData {
        match scope {
            Scope::User => &self.user,
            Scope::System => &self.system,
        }
    }

    pub fn scope_mut(&mut self, scope: Scope) -> &mut NodeData {
        match scope {
            Scope::User => &mut self.user,
            Scope::System => &mut self.system,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &[&str]) -> NodePath {
        NodePath::try_from_segments(s.iter().copied()).unwrap()
    }

    #[test]
    fn get_or_create_builds_chain() {
        let mut root = NodeData::default();
        root.get_or_create(&path(&["a", "b"]))
            .entries
            .insert("k".to_string(), Slot::Text("v".to_string()));
        assert!(root.get(&path(&["a"])).is_some());
        assert_eq!(
            root.get(&path(&["a", "b"])).unwrap().entries.get("k"),
            Some(&Slot::Text("v".to_string()))
        );
        assert_eq!(root.node_count(), 3);
    }

    #[test]
    fn remove_subtree_detaches() {
        let mut root = NodeData::default();
        root.get_or_create(&path(&["a", "b", "c"]));
        let removed = root.remove_subtree(&path(&["a", "b"])).unwrap();
        assert_eq!(removed.node_count(), 2);
        assert!(root.get(&path(&["a", "b"])).is_none());
        assert!(root.get(&path(&["a"])).is_some());
        assert!(root.remove_subtree(&NodePath::root()).is_none());
    }

    #[test]
    fn slot_serializes_bytes_as_base64() {
        let slot = Slot::Bytes(vec![0, 1, 2]);
        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(json, r#"{"bytes":"AAEC"}"#);
        let back: Slot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slot);
    }

    #[test]
    fn slot_rejects_bad_base64() {
        assert!(serde_json::from_str::<Slot>(r#"{"bytes":"***"}"#).is_err());
    }

    #[test]
    fn forest_document_shape() {
        let mut forest = Forest::default();
        forest
            .scope_mut(Scope::System)
            .get_or_create(&path(&["x"]))
            .entries
            .insert("k".to_string(), Slot::Text("1".to_string()));
        let json = serde_json::to_value(&forest).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "User": {},
                "System": {"children": {"x": {"entries": {"k": {"text": "1"}}}}},
            })
        );
        let back: Forest = serde_json::from_value(json).unwrap();
        assert_eq!(back, forest);
    }
}
