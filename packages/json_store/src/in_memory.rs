//! In-memory store backed by a pair of node trees.

use preftree_core_store::{
    Error, Limits, NodeAddress, Result, StoreAdapter, StoreNode, TypedValue,
};

use crate::forest::{Forest, NodeData, Slot};

/// A store that lives entirely in memory.
///
/// # Example
///
/// ```rust
/// use preftree_json_store::InMemoryStore;
/// use preftree_core_store::{address, StoreAdapter, TypeTag, TypedValue};
///
/// let mut store = InMemoryStore::new();
/// let node = store.ensure_node(&address!("User:/app/window")).unwrap();
/// store.put_value(&node, "width", TypedValue::Int32(640)).unwrap();
///
/// assert_eq!(store.guess_type(&node, "width").unwrap(), TypeTag::Int32);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    forest: Forest,
    limits: Limits,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            forest: Forest::default(),
            limits,
        }
    }

    pub fn from_forest(forest: Forest, limits: Limits) -> Self {
        Self { forest, limits }
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Swap in a new snapshot, returning the old one.
    pub fn replace_forest(&mut self, forest: Forest) -> Forest {
        std::mem::replace(&mut self.forest, forest)
    }

    fn node(&self, address: &NodeAddress) -> Option<&NodeData> {
        self.forest.scope(address.scope).get(&address.path)
    }

    fn existing(&self, node: &StoreNode) -> Result<&NodeData> {
        self.node(node.address())
            .ok_or_else(|| Error::node_not_found(node.address()))
    }

    fn existing_mut(&mut self, node: &StoreNode) -> Result<&mut NodeData> {
        let address = node.address();
        self.forest
            .scope_mut(address.scope)
            .get_mut(&address.path)
            .ok_or_else(|| Error::node_not_found(address))
    }
}

impl StoreAdapter for InMemoryStore {
    fn ensure_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        for segment in address.path.iter() {
            self.limits.check_name(segment)?;
        }
        let root = self.forest.scope_mut(address.scope);
        if root.get(&address.path).is_none() {
            log::debug!("Creating node {}", address);
            root.get_or_create(&address.path);
        }
        Ok(StoreNode::new(address.clone()))
    }

    fn get_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        match self.node(address) {
            Some(_) => Ok(StoreNode::new(address.clone())),
            None => Err(Error::node_not_found(address)),
        }
    }

    fn node_exists(&mut self, address: &NodeAddress) -> Result<bool> {
        Ok(self.node(address).is_some())
    }

    fn list_children(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        Ok(self.existing(node)?.children.keys().cloned().collect())
    }

    fn list_keys(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        Ok(self.existing(node)?.entries.keys().cloned().collect())
    }

    fn get_raw(&mut self, node: &StoreNode, key: &str) -> Result<Option<String>> {
        Ok(self.existing(node)?.entries.get(key).map(Slot::raw_text))
    }

    fn get_bytes(&mut self, node: &StoreNode, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(match self.existing(node)?.entries.get(key) {
            Some(Slot::Bytes(bytes)) => Some(bytes.clone()),
            _ => None,
        })
    }

    fn put_value(&mut self, node: &StoreNode, key: &str, value: TypedValue) -> Result<()> {
        self.limits.check_key(key)?;
        self.limits.check_value(&value.to_raw_text())?;
        let data = self.existing_mut(node)?;
        log::debug!("Writing {}:{} = {}", node, key, value);
        data.entries.insert(key.to_string(), Slot::from(value));
        Ok(())
    }

    fn remove_key(&mut self, node: &StoreNode, key: &str) -> Result<()> {
        self.existing_mut(node)?.entries.remove(key);
        Ok(())
    }

    fn remove_node(&mut self, node: &StoreNode) -> Result<()> {
        let address = node.address();
        if address.is_root() {
            return Err(Error::validation(format!(
                "scope root {} cannot be removed",
                address
            )));
        }
        match self
            .forest
            .scope_mut(address.scope)
            .remove_subtree(&address.path)
        {
            Some(removed) => {
                log::info!("Removed {} ({} nodes)", address, removed.node_count());
                Ok(())
            }
            None => Err(Error::node_not_found(address)),
        }
    }

    // Nothing is shared or persisted.
    fn sync(&mut self, _node: &StoreNode) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self, _node: &StoreNode) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preftree_core_store::{address, test_suite, TypeTag};

    #[test]
    fn conformance() {
        test_suite::run_all(InMemoryStore::new);
    }

    #[test]
    fn custom_limits_apply() {
        let mut store = InMemoryStore::with_limits(Limits {
            max_key_length: 3,
            max_value_length: 4,
            max_name_length: 5,
        });
        let node = store.ensure_node(&address!("User:/short")).unwrap();
        assert!(store.put_value(&node, "abc", "1234".into()).is_ok());
        assert!(store.put_value(&node, "abcd", "1".into()).is_err());
        assert!(store.put_value(&node, "a", "12345".into()).is_err());
        assert!(store.ensure_node(&address!("User:/toolong")).is_err());
        assert!(!store.node_exists(&address!("User:/toolong")).unwrap());
    }

    #[test]
    fn byte_limit_counts_encoded_length() {
        let mut store = InMemoryStore::with_limits(Limits {
            max_value_length: 4,
            ..Limits::default()
        });
        let node = store.ensure_node(&address!("User:/b")).unwrap();
        // 3 bytes encode to 4 characters, 4 bytes to 8
        assert!(store
            .put_value(&node, "ok", TypedValue::ByteSequence(vec![1, 2, 3]))
            .is_ok());
        assert!(store
            .put_value(&node, "big", TypedValue::ByteSequence(vec![1, 2, 3, 4]))
            .is_err());
    }

    #[test]
    fn forest_snapshot_reflects_writes() {
        let mut store = InMemoryStore::new();
        let node = store.ensure_node(&address!("System:/a/b")).unwrap();
        store.put_value(&node, "k", TypedValue::Int64(7)).unwrap();

        let snapshot = store.forest().clone();
        let mut copy = InMemoryStore::from_forest(snapshot, Limits::default());
        let node = copy.get_node(&address!("System:/a/b")).unwrap();
        assert_eq!(copy.guess_type(&node, "k").unwrap(), TypeTag::Int32);
        assert_eq!(
            copy.get_value(&node, "k", TypeTag::Int64).unwrap(),
            TypedValue::Int64(7)
        );
    }
}
