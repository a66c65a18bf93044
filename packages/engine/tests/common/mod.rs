//! A store wrapper that fails chosen operations on demand.
#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use preftree_core_store::{
    address, Error, NodeAddress, Result, StoreAdapter, StoreNode, TypedValue,
};
use preftree_json_store::InMemoryStore;

/// Shared switches, so a test can keep a handle after boxing the store.
#[derive(Clone, Default)]
pub struct Faults {
    /// Fail the n-th `put_value` from now (1-based); 0 disables.
    pub fail_put_after: Rc<Cell<usize>>,
    pub fail_remove_node: Rc<Cell<bool>>,
    pub fail_ensure_node: Rc<Cell<bool>>,
    pub fail_flush: Rc<Cell<bool>>,
}

pub struct FaultyStore {
    inner: InMemoryStore,
    faults: Faults,
}

impl FaultyStore {
    pub fn new(inner: InMemoryStore) -> (Self, Faults) {
        let faults = Faults::default();
        (
            Self {
                inner,
                faults: faults.clone(),
            },
            faults,
        )
    }
}

fn injected(what: &str) -> Error {
    Error::store(format!("injected {} failure", what))
}

impl StoreAdapter for FaultyStore {
    fn ensure_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        if self.faults.fail_ensure_node.get() && !self.inner.node_exists(address)? {
            return Err(injected("ensure_node"));
        }
        self.inner.ensure_node(address)
    }

    fn get_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        self.inner.get_node(address)
    }

    fn node_exists(&mut self, address: &NodeAddress) -> Result<bool> {
        self.inner.node_exists(address)
    }

    fn list_children(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        self.inner.list_children(node)
    }

    fn list_keys(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        self.inner.list_keys(node)
    }

    fn get_raw(&mut self, node: &StoreNode, key: &str) -> Result<Option<String>> {
        self.inner.get_raw(node, key)
    }

    fn get_bytes(&mut self, node: &StoreNode, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get_bytes(node, key)
    }

    fn put_value(&mut self, node: &StoreNode, key: &str, value: TypedValue) -> Result<()> {
        let countdown = self.faults.fail_put_after.get();
        if countdown > 0 {
            self.faults.fail_put_after.set(countdown - 1);
            if countdown == 1 {
                return Err(injected("put_value"));
            }
        }
        self.inner.put_value(node, key, value)
    }

    fn remove_key(&mut self, node: &StoreNode, key: &str) -> Result<()> {
        self.inner.remove_key(node, key)
    }

    fn remove_node(&mut self, node: &StoreNode) -> Result<()> {
        if self.faults.fail_remove_node.get() {
            return Err(injected("remove_node"));
        }
        self.inner.remove_node(node)
    }

    fn sync(&mut self, node: &StoreNode) -> Result<()> {
        self.inner.sync(node)
    }

    fn flush(&mut self, node: &StoreNode) -> Result<()> {
        if self.faults.fail_flush.get() {
            return Err(Error::unavailable("injected flush failure"));
        }
        self.inner.flush(node)
    }
}

/// `User:/src` holding three keys and a child with one key, plus an empty
/// `System:/dst`.
pub fn sample_store() -> InMemoryStore {
    let mut store = InMemoryStore::new();
    let src = store.ensure_node(&address!("User:/src")).unwrap();
    store.put_value(&src, "a", TypedValue::Int32(1)).unwrap();
    store.put_value(&src, "b", TypedValue::Boolean(true)).unwrap();
    store.put_value(&src, "c", "three".into()).unwrap();
    let child = store.ensure_node(&address!("User:/src/child")).unwrap();
    store.put_value(&child, "d", TypedValue::Int64(1 << 40)).unwrap();
    store.ensure_node(&address!("System:/dst")).unwrap();
    store
}
