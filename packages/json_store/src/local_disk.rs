//! Store persisted as a single JSON document on local disk.
//!
//! The whole store is loaded into memory when opened. Mutations apply to the
//! in-memory copy and are also journaled. `flush` re-reads the document,
//! replays the journal onto it and writes the result through a temporary file
//! and a rename, so other handles' flushed writes survive and readers never
//! see a half-written store.

use std::{fs, io, path};

use preftree_core_store::{
    Error, Limits, NodeAddress, Result, StoreAdapter, StoreNode, TypedValue,
};

use crate::forest::Forest;
use crate::in_memory::InMemoryStore;

/// A mutation made through this handle and not yet written to disk.
#[derive(Clone, Debug)]
enum Pending {
    Ensure(NodeAddress),
    Put(NodeAddress, String, TypedValue),
    RemoveKey(NodeAddress, String),
    RemoveNode(NodeAddress),
}

impl Pending {
    fn apply(&self, store: &mut InMemoryStore) -> Result<()> {
        match self {
            Pending::Ensure(address) => store.ensure_node(address).map(|_| ()),
            Pending::Put(address, key, value) => {
                let node = store.get_node(address)?;
                store.put_value(&node, key, value.clone())
            }
            Pending::RemoveKey(address, key) => {
                let node = store.get_node(address)?;
                store.remove_key(&node, key)
            }
            Pending::RemoveNode(address) => {
                let node = store.get_node(address)?;
                store.remove_node(&node)
            }
        }
    }
}

pub struct JsonFileStore {
    file: path::PathBuf,
    memory: InMemoryStore,
    pending: Vec<Pending>,
}

impl JsonFileStore {
    /// Open the store at `file`. A missing file opens as an empty store and
    /// is created on the first flush.
    pub fn open(file: impl Into<path::PathBuf>) -> Result<JsonFileStore> {
        Self::open_with_limits(file, Limits::default())
    }

    pub fn open_with_limits(file: impl Into<path::PathBuf>, limits: Limits) -> Result<JsonFileStore> {
        let file = file.into();
        let forest = Self::load(&file)?;
        log::info!("Opened store {}", file.display());
        Ok(JsonFileStore {
            file,
            memory: InMemoryStore::from_forest(forest, limits),
            pending: Vec::new(),
        })
    }

    pub fn file(&self) -> &path::Path {
        &self.file
    }

    /// True when there are mutations not yet flushed to disk.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    fn load(file: &path::Path) -> Result<Forest> {
        log::debug!("Reading {}...", file.display());
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} does not exist, starting empty", file.display());
                return Ok(Forest::default());
            }
            Err(err) => {
                return Err(Error::unavailable_with(
                    format!("cannot read store file {}", file.display()),
                    err,
                ))
            }
        };
        serde_json::from_str(&text).map_err(|err| {
            Error::unavailable_with(
                format!("store file {} is not a valid store document", file.display()),
                err,
            )
        })
    }

    /// The document as it is on disk now, with this handle's journal
    /// replayed on top. Entries whose node another writer removed are
    /// dropped.
    fn merged(&self) -> Result<InMemoryStore> {
        let forest = Self::load(&self.file)?;
        let mut merged = InMemoryStore::from_forest(forest, *self.memory.limits());
        for change in &self.pending {
            match change.apply(&mut merged) {
                Ok(()) => {}
                Err(Error::NotFound { .. }) => {
                    log::warn!("Dropping {:?}: node removed by another writer", change)
                }
                Err(err) => return Err(err),
            }
        }
        Ok(merged)
    }

    fn write_out(&self, forest: &Forest) -> Result<()> {
        let text = serde_json::to_string_pretty(forest)
            .map_err(|err| Error::store_with("cannot serialize store", err))?;

        if let Some(parent) = self.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                Error::unavailable_with(
                    format!("cannot create directory {}", parent.display()),
                    err,
                )
            })?;
        }

        let mut staging = self.file.clone().into_os_string();
        staging.push(".tmp");
        let staging = path::PathBuf::from(staging);

        log::debug!("Writing {}...", self.file.display());
        fs::write(&staging, text).map_err(|err| {
            Error::unavailable_with(format!("cannot write {}", staging.display()), err)
        })?;
        fs::rename(&staging, &self.file).map_err(|err| {
            Error::unavailable_with(
                format!("cannot replace {}", self.file.display()),
                err,
            )
        })
    }

    fn journal<T>(&mut self, result: Result<T>, change: Pending) -> Result<T> {
        if result.is_ok() {
            self.pending.push(change);
        }
        result
    }
}

impl StoreAdapter for JsonFileStore {
    fn ensure_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        if self.memory.node_exists(address)? {
            return self.memory.get_node(address);
        }
        let result = self.memory.ensure_node(address);
        self.journal(result, Pending::Ensure(address.clone()))
    }

    fn get_node(&mut self, address: &NodeAddress) -> Result<StoreNode> {
        self.memory.get_node(address)
    }

    fn node_exists(&mut self, address: &NodeAddress) -> Result<bool> {
        self.memory.node_exists(address)
    }

    fn list_children(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        self.memory.list_children(node)
    }

    fn list_keys(&mut self, node: &StoreNode) -> Result<Vec<String>> {
        self.memory.list_keys(node)
    }

    fn get_raw(&mut self, node: &StoreNode, key: &str) -> Result<Option<String>> {
        self.memory.get_raw(node, key)
    }

    fn get_bytes(&mut self, node: &StoreNode, key: &str) -> Result<Option<Vec<u8>>> {
        self.memory.get_bytes(node, key)
    }

    fn put_value(&mut self, node: &StoreNode, key: &str, value: TypedValue) -> Result<()> {
        let result = self.memory.put_value(node, key, value.clone());
        self.journal(result, Pending::Put(node.address().clone(), key.to_string(), value))
    }

    fn remove_key(&mut self, node: &StoreNode, key: &str) -> Result<()> {
        let result = self.memory.remove_key(node, key);
        self.journal(result, Pending::RemoveKey(node.address().clone(), key.to_string()))
    }

    fn remove_node(&mut self, node: &StoreNode) -> Result<()> {
        let result = self.memory.remove_node(node);
        self.journal(result, Pending::RemoveNode(node.address().clone()))
    }

    /// Push pending changes, then take the document as it now stands so
    /// writes flushed by other handles become visible.
    fn sync(&mut self, node: &StoreNode) -> Result<()> {
        if self.is_dirty() {
            self.flush(node)?;
        } else {
            let forest = Self::load(&self.file)?;
            self.memory.replace_forest(forest);
        }
        log::debug!("Synchronized {}", self.file.display());
        Ok(())
    }

    fn flush(&mut self, _node: &StoreNode) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        let merged = self.merged()?;
        self.write_out(merged.forest())?;
        self.memory.replace_forest(merged.forest().clone());
        self.pending.clear();
        log::info!("Flushed {}", self.file.display());
        Ok(())
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        if self.is_dirty() {
            log::warn!(
                "Dropping {} with unflushed changes",
                self.file.display()
            );
        }
    }
}
