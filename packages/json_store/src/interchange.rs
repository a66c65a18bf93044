//! JSON export and import of nodes through any `StoreAdapter`.
//!
//! A document records the address it was exported from and the node's
//! entries (and optionally its whole subtree):
//!
//! ```json
//! {
//!   "address": "User:/app",
//!   "node": {
//!     "entries": { "width": { "type": "Int32", "value": "640" } },
//!     "children": { "window": { "entries": {}, "children": {} } }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use preftree_core_store::{
    coerce, parse, Error, NodeAddress, Result, StoreAdapter, StoreNode, TypeTag, TypedValue,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportDepth {
    NodeOnly,
    Subtree,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub address: String,
    pub node: ExportedNode,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportedNode {
    #[serde(default)]
    pub entries: BTreeMap<String, ExportedEntry>,
    #[serde(default)]
    pub children: BTreeMap<String, ExportedNode>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportedEntry {
    #[serde(rename = "type")]
    pub tag: String,
    pub value: String,
}

/// Capture the node at `address`, with or without its descendants.
pub fn export<S: StoreAdapter + ?Sized>(
    store: &mut S,
    address: &NodeAddress,
    depth: ExportDepth,
) -> Result<ExportDocument> {
    let node = store.get_node(address)?;
    let exported = export_node(store, &node, depth)?;
    log::debug!("Exported {} ({:?})", address, depth);
    Ok(ExportDocument {
        address: address.to_string(),
        node: exported,
    })
}

fn export_node<S: StoreAdapter + ?Sized>(
    store: &mut S,
    node: &StoreNode,
    depth: ExportDepth,
) -> Result<ExportedNode> {
    let mut exported = ExportedNode::default();
    for entry in store.read_entries(node)? {
        exported.entries.insert(
            entry.key,
            ExportedEntry {
                tag: entry.tag.as_str().to_string(),
                value: entry.raw_text,
            },
        );
    }
    if depth == ExportDepth::Subtree {
        for name in store.list_children(node)? {
            let child = store.get_node(&node.address().child(&name)?)?;
            let sub = export_node(store, &child, depth)?;
            exported.children.insert(name, sub);
        }
    }
    Ok(exported)
}

pub fn to_json(document: &ExportDocument) -> Result<String> {
    serde_json::to_string_pretty(document)
        .map_err(|err| Error::store_with("cannot serialize export document", err))
}

pub fn from_json(text: &str) -> Result<ExportDocument> {
    serde_json::from_str(text)
        .map_err(|err| Error::validation(format!("not an export document: {}", err)))
}

/// Write a document back at the address it was exported from.
pub fn import<S: StoreAdapter + ?Sized>(store: &mut S, document: &ExportDocument) -> Result<StoreNode> {
    let address = parse(&document.address)
        .map_err(|err| Error::validation(format!("bad address in export document: {}", err)))?;
    import_at(store, document, &address)
}

/// Write a document at `target`, ignoring its recorded address.
///
/// The whole document is validated before anything is written. Existing
/// entries with the same keys are overwritten; other entries are kept.
pub fn import_at<S: StoreAdapter + ?Sized>(
    store: &mut S,
    document: &ExportDocument,
    target: &NodeAddress,
) -> Result<StoreNode> {
    let mut writes = Vec::new();
    plan(&document.node, target, &mut writes)?;

    for (address, values) in writes {
        let node = store.ensure_node(&address)?;
        for (key, value) in values {
            store.put_value(&node, &key, value)?;
        }
    }
    log::info!("Imported {} into {}", document.address, target);
    store.get_node(target)
}

type PlannedWrite = (NodeAddress, Vec<(String, TypedValue)>);

fn plan(node: &ExportedNode, at: &NodeAddress, writes: &mut Vec<PlannedWrite>) -> Result<()> {
    let mut values = Vec::with_capacity(node.entries.len());
    for (key, entry) in &node.entries {
        let tag: TypeTag = entry.tag.parse()?;
        let value = coerce(&entry.value, tag).map_err(|err| {
            Error::validation(format!("entry '{}' under {}: {}", key, at, err))
        })?;
        values.push((key.clone(), value));
    }
    writes.push((at.clone(), values));
    for (name, child) in &node.children {
        plan(child, &at.child(name)?, writes)?;
    }
    Ok(())
}
