//! The capability set the engine needs from a backing store.
//!
//! A backing store has no move primitive and no transactions. Everything the
//! engine does is built from the calls below, each of which may block on I/O
//! and may fail independently of the others.

use crate::address::NodeAddress;
use crate::error::Result;
use crate::value::{coerce, infer_type, TypeTag, TypedValue};

/// Handle to a node that existed when it was handed out.
///
/// Handles are plain addresses: they stay valid as values after the node is
/// removed, and any store call made with a stale handle fails with
/// `NotFound`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoreNode {
    address: NodeAddress,
}

impl StoreNode {
    /// Stores build handles; callers get them from `ensure_node`/`get_node`.
    pub fn new(address: NodeAddress) -> Self {
        Self { address }
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn name(&self) -> &str {
        self.address.name()
    }

    pub fn is_root(&self) -> bool {
        self.address.is_root()
    }
}

impl std::fmt::Display for StoreNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.address.fmt(f)
    }
}

/// One row of a node's values table.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: String,
    pub tag: TypeTag,
    pub raw_text: String,
}

/// Access to a hierarchical key-value store.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn StoreAdapter>`.
pub trait StoreAdapter {
    /// Return the node at `address`, creating it and any missing ancestors.
    fn ensure_node(&mut self, address: &NodeAddress) -> Result<StoreNode>;

    /// Return the node at `address`, or `NotFound`.
    fn get_node(&mut self, address: &NodeAddress) -> Result<StoreNode>;

    fn node_exists(&mut self, address: &NodeAddress) -> Result<bool>;

    /// Child names in ascending order.
    fn list_children(&mut self, node: &StoreNode) -> Result<Vec<String>>;

    /// Key names in ascending order.
    fn list_keys(&mut self, node: &StoreNode) -> Result<Vec<String>>;

    /// Raw text of a key. Byte-slot entries read as base64.
    fn get_raw(&mut self, node: &StoreNode, key: &str) -> Result<Option<String>>;

    /// Byte-slot contents of a key, or `None` if the key holds text.
    fn get_bytes(&mut self, node: &StoreNode, key: &str) -> Result<Option<Vec<u8>>>;

    fn put_value(&mut self, node: &StoreNode, key: &str, value: TypedValue) -> Result<()>;

    /// Removing a missing key is not an error.
    fn remove_key(&mut self, node: &StoreNode, key: &str) -> Result<()>;

    /// Remove the node and all its descendants. Scope roots cannot be removed.
    fn remove_node(&mut self, node: &StoreNode) -> Result<()>;

    /// Pull changes written by others into this handle's view of the store.
    fn sync(&mut self, node: &StoreNode) -> Result<()>;

    /// Push pending changes to persistent storage.
    fn flush(&mut self, node: &StoreNode) -> Result<()>;

    /// Typed read. Missing keys, and text that does not parse as `tag`, give
    /// `TypedValue::default_for(tag)`.
    fn get_value(&mut self, node: &StoreNode, key: &str, tag: TypeTag) -> Result<TypedValue> {
        if tag == TypeTag::ByteSequence {
            return Ok(self
                .get_bytes(node, key)?
                .map(TypedValue::ByteSequence)
                .unwrap_or_else(|| TypedValue::default_for(tag)));
        }
        Ok(match self.get_raw(node, key)? {
            Some(raw) => coerce(&raw, tag).unwrap_or_else(|_| TypedValue::default_for(tag)),
            None => TypedValue::default_for(tag),
        })
    }

    /// Infer the type of a stored key, consulting the byte slot.
    fn guess_type(&mut self, node: &StoreNode, key: &str) -> Result<TypeTag> {
        let raw = self.get_raw(node, key)?.unwrap_or_default();
        let has_bytes = self
            .get_bytes(node, key)?
            .is_some_and(|bytes| !bytes.is_empty());
        Ok(infer_type(&raw, has_bytes))
    }

    /// Every key of a node with its inferred type, sorted by key.
    fn read_entries(&mut self, node: &StoreNode) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for key in self.list_keys(node)? {
            let tag = self.guess_type(node, &key)?;
            let raw_text = self.get_raw(node, &key)?.unwrap_or_default();
            entries.push(Entry { key, tag, raw_text });
        }
        Ok(entries)
    }
}

impl<T: StoreAdapter + ?Sized> StoreAdapter for &mut T {
    fn ensure_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        (**self).ensure_node(address)
    }

    fn get_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        (**self).get_node(address)
    }

    fn node_exists(&mut self, address: &NodeAddress) -> Result<bool> {
        (**self).node_exists(address)
    }

    fn list_children(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        (**self).list_children(node)
    }

    fn list_keys(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        (**self).list_keys(node)
    }

    fn get_raw(&mut self, node: &StoreNode, key: &str) -> Result<Option<String>> {
        (**self).get_raw(node, key)
    }

    fn get_bytes(&mut self, node: &StoreNode, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get_bytes(node, key)
    }

    fn put_value(&mut self, node: &StoreNode, key: &str, value: TypedValue) -> Result<()> {
        (**self).put_value(node, key, value)
    }

    fn remove_key(&mut self, node: &StoreNode, key: &str) -> Result<()> {
        (**self).remove_key(node, key)
    }

    fn remove_node(&mut self, node: &StoreNode) -> Result<()> {
        (**self).remove_node(node)
    }

    fn sync(&mut self, node: &StoreNode) -> Result<()> {
        (**self).sync(node)
    }

    fn flush(&mut self, node: &StoreNode) -> Result<()> {
        (**self).flush(node)
    }
}

impl<T: StoreAdapter + ?Sized> StoreAdapter for Box<T> {
    fn ensure_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        self.as_mut().ensure_node(address)
    }

    fn get_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        self.as_mut().get_node(address)
    }

    fn node_exists(&mut self, address: &NodeAddress) -> Result<bool> {
        self.as_mut().node_exists(address)
    }

    fn list_children(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        self.as_mut().list_children(node)
    }

    fn list_keys(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        self.as_mut().list_keys(node)
    }

    fn get_raw(&mut self, node: &StoreNode, key: &str) -> Result<Option<String>> {
        self.as_mut().get_raw(node, key)
    }

    fn get_bytes(&mut self, node: &StoreNode, key: &str) -> Result<Option<Vec<u8>>> {
        self.as_mut().get_bytes(node, key)
    }

    fn put_value(&mut self, node: &StoreNode, key: &str, value: TypedValue) -> Result<()> {
        self.as_mut().put_value(node, key, value)
    }

    fn remove_key(&mut self, node: &StoreNode, key: &str) -> Result<()> {
        self.as_mut().remove_key(node, key)
    }

    fn remove_node(&mut self, node: &StoreNode) -> Result<()> {
        self.as_mut().remove_node(node)
    }

    fn sync(&mut self, node: &StoreNode) -> Result<()> {
        self.as_mut().sync(node)
    }

    fn flush(&mut self, node: &StoreNode) -> Result<()> {
        self.as_mut().flush(node)
    }
}
