//! In-memory mirror of the store's node structure.
//!
//! The view is an arena of nodes addressed by `ViewId`. Each node keeps its
//! children in a map keyed by name, so sibling order always matches the
//! store's name order. The top node is a label-only "Preferences" node whose
//! two children are the scope roots.
//!
//! The view is never authoritative. After a store mutation succeeds the
//! owner patches the view; if a patch fails, the only repair is `rebuild`.

use std::collections::BTreeMap;

use preftree_core_store::{Error, NodeAddress, Result, Scope, StoreAdapter};

pub const TOP_LABEL: &str = "Preferences";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(usize);

#[derive(Clone, Debug)]
struct ViewNode {
    label: String,
    address: Option<NodeAddress>,
    parent: Option<ViewId>,
    children: BTreeMap<String, ViewId>,
}

/// Structural snapshot of a view subtree: labels and children, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewShape {
    pub label: String,
    pub children: Vec<ViewShape>,
}

#[derive(Clone, Debug)]
struct Arena {
    slots: Vec<Option<ViewNode>>,
    free: Vec<usize>,
    top: ViewId,
}

impl Arena {
    fn with_top() -> Self {
        let mut arena = Arena {
            slots: Vec::new(),
            free: Vec::new(),
            top: ViewId(0),
        };
        arena.top = arena.alloc(ViewNode {
            label: TOP_LABEL.to_string(),
            address: None,
            parent: None,
            children: BTreeMap::new(),
        });
        arena
    }

    fn alloc(&mut self, node: ViewNode) -> ViewId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                ViewId(index)
            }
            None => {
                self.slots.push(Some(node));
                ViewId(self.slots.len() - 1)
            }
        }
    }

    fn get(&self, id: ViewId) -> Result<&ViewNode> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::NotFound {
                what: format!("view node #{}", id.0),
            })
    }

    fn get_mut(&mut self, id: ViewId) -> Result<&mut ViewNode> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::NotFound {
                what: format!("view node #{}", id.0),
            })
    }

    /// Attach a new child under `parent`.
    fn attach(&mut self, parent: ViewId, label: &str, address: NodeAddress) -> Result<ViewId> {
        let id = self.alloc(ViewNode {
            label: label.to_string(),
            address: Some(address),
            parent: Some(parent),
            children: BTreeMap::new(),
        });
        self.get_mut(parent)?.children.insert(label.to_string(), id);
        Ok(id)
    }

    /// Release `id` and everything below it. Does not unlink it from its parent.
    fn release(&mut self, id: ViewId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.slots.get_mut(current.0).and_then(Option::take) {
                pending.extend(node.children.values().copied());
                self.free.push(current.0);
            }
        }
    }

    fn detach(&mut self, id: ViewId) -> Result<()> {
        let node = self.get(id)?;
        let label = node.label.clone();
        let parent = node.parent;
        if let Some(parent) = parent {
            self.get_mut(parent)?.children.remove(&label);
        }
        self.release(id);
        Ok(())
    }

    /// Mirror the store subtree at `address` under `parent`.
    fn load<S: StoreAdapter + ?Sized>(
        &mut self,
        store: &mut S,
        parent: ViewId,
        label: &str,
        address: &NodeAddress,
    ) -> Result<ViewId> {
        let node = store.get_node(address)?;
        let id = self.attach(parent, label, address.clone())?;
        for name in store.list_children(&node)? {
            self.load(store, id, &name, &address.child(&name)?)?;
        }
        Ok(id)
    }

    fn shape(&self, id: ViewId) -> Result<ViewShape> {
        let node = self.get(id)?;
        let children = node
            .children
            .values()
            .map(|child| self.shape(*child))
            .collect::<Result<Vec<_>>>()?;
        Ok(ViewShape {
            label: node.label.clone(),
            children,
        })
    }

    fn build<S: StoreAdapter + ?Sized>(store: &mut S) -> Result<Arena> {
        let mut arena = Arena::with_top();
        for scope in Scope::ALL {
            let top = arena.top;
            arena.load(store, top, scope.as_str(), &NodeAddress::root(scope))?;
        }
        Ok(arena)
    }
}

/// Keeps the view consistent with a backing store.
#[derive(Clone, Debug)]
pub struct ViewTreeSynchronizer {
    arena: Arena,
}

impl Default for ViewTreeSynchronizer {
    fn default() -> Self {
        Self {
            arena: Arena::with_top(),
        }
    }
}

impl ViewTreeSynchronizer {
    /// An empty view holding only the top node. Call `rebuild` to populate it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole view with a fresh traversal of both scopes.
    ///
    /// On failure the previous view is kept.
    pub fn rebuild<S: StoreAdapter + ?Sized>(&mut self, store: &mut S) -> Result<ViewId> {
        let arena = Arena::build(store)?;
        log::debug!("Rebuilt view ({} nodes)", arena.slots.len() - arena.free.len());
        self.arena = arena;
        Ok(self.arena.top)
    }

    /// Reflect a node added (or copied) as `child_name` under `parent`.
    ///
    /// The child's whole store subtree is loaded. An existing view child with
    /// the same name is replaced.
    pub fn patch_after_add<S: StoreAdapter + ?Sized>(
        &mut self,
        store: &mut S,
        parent: ViewId,
        child_name: &str,
    ) -> Result<ViewId> {
        let parent_address = self.store_address(parent)?.clone();
        let address = parent_address.child(child_name)?;

        // build off to the side so a failed read leaves this view untouched
        let mut scratch = Arena::with_top();
        let top = scratch.top;
        let loaded = scratch.load(store, top, child_name, &address)?;

        let existing = self.arena.get(parent)?.children.get(child_name).copied();
        if let Some(existing) = existing {
            self.arena.detach(existing)?;
        }
        self.graft(&scratch, loaded, parent)
    }

    /// Reflect the removal of the node shown at `node`.
    pub fn patch_after_remove(&mut self, node: ViewId) -> Result<()> {
        let address = self.store_address(node)?;
        if address.is_root() {
            return Err(Error::validation(format!(
                "scope root {} cannot be removed from the view",
                address
            )));
        }
        self.arena.detach(node)
    }

    /// Reflect moving `source` to `new_name` under `destination_parent`.
    ///
    /// The moved subtree keeps its shape; every address in it is rebased.
    pub fn patch_after_move(
        &mut self,
        source: ViewId,
        destination_parent: ViewId,
        new_name: &str,
    ) -> Result<ViewId> {
        let source_address = self.store_address(source)?.clone();
        let parent_address = self.store_address(destination_parent)?.clone();
        if source_address.is_root() {
            return Err(Error::validation("scope roots cannot be moved"));
        }
        let destination_address = parent_address.child(new_name)?;
        if destination_address.is_within(&source_address) {
            return Err(Error::validation(format!(
                "{} lies inside {}",
                destination_address, source_address
            )));
        }
        if self
            .arena
            .get(destination_parent)?
            .children
            .contains_key(new_name)
        {
            return Err(Error::Conflict {
                address: destination_address,
            });
        }

        let old_label = self.arena.get(source)?.label.clone();
        let old_parent = self.arena.get(source)?.parent;
        if let Some(old_parent) = old_parent {
            self.arena.get_mut(old_parent)?.children.remove(&old_label);
        }
        {
            let node = self.arena.get_mut(source)?;
            node.label = new_name.to_string();
            node.parent = Some(destination_parent);
        }
        self.arena
            .get_mut(destination_parent)?
            .children
            .insert(new_name.to_string(), source);
        self.rebase(source, &source_address, &destination_address)?;
        Ok(source)
    }

    pub fn top(&self) -> ViewId {
        self.arena.top
    }

    /// The view node mirroring `address`, if it is shown.
    pub fn find(&self, address: &NodeAddress) -> Option<ViewId> {
        let mut current = self
            .arena
            .get(self.arena.top)
            .ok()?
            .children
            .get(address.scope.as_str())
            .copied()?;
        for segment in address.path.iter() {
            current = self.arena.get(current).ok()?.children.get(segment).copied()?;
        }
        Some(current)
    }

    pub fn label(&self, id: ViewId) -> Result<&str> {
        Ok(&self.arena.get(id)?.label)
    }

    /// The store address shown at `id`; `None` for the top node.
    pub fn address(&self, id: ViewId) -> Result<Option<&NodeAddress>> {
        Ok(self.arena.get(id)?.address.as_ref())
    }

    pub fn parent(&self, id: ViewId) -> Result<Option<ViewId>> {
        Ok(self.arena.get(id)?.parent)
    }

    /// Children in name order.
    pub fn children(&self, id: ViewId) -> Result<Vec<ViewId>> {
        Ok(self.arena.get(id)?.children.values().copied().collect())
    }

    /// Number of live nodes, the top node included.
    pub fn len(&self) -> usize {
        self.arena.slots.len() - self.arena.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> ViewShape {
        // the top node always exists
        self.arena.shape(self.arena.top).unwrap_or_else(|_| ViewShape {
            label: TOP_LABEL.to_string(),
            children: Vec::new(),
        })
    }

    /// Compare the view against a fresh traversal of `store`.
    pub fn verify<S: StoreAdapter + ?Sized>(&self, store: &mut S) -> Result<bool> {
        let fresh = Arena::build(store)?;
        Ok(fresh.shape(fresh.top)? == self.shape())
    }

    /// Indented text drawing of the subtree at `id`.
    pub fn render(&self, id: ViewId) -> Result<String> {
        let mut out = String::new();
        self.render_into(id, 0, &mut out)?;
        Ok(out)
    }

    fn render_into(&self, id: ViewId, depth: usize, out: &mut String) -> Result<()> {
        let node = self.arena.get(id)?;
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.label);
        out.push('\n');
        for child in node.children.values() {
            self.render_into(*child, depth + 1, out)?;
        }
        Ok(())
    }

    fn store_address(&self, id: ViewId) -> Result<&NodeAddress> {
        self.arena
            .get(id)?
            .address
            .as_ref()
            .ok_or_else(|| Error::validation(format!("'{}' has no store node", TOP_LABEL)))
    }

    /// Copy the subtree at `from` in `scratch` under `parent` in this view.
    fn graft(&mut self, scratch: &Arena, from: ViewId, parent: ViewId) -> Result<ViewId> {
        let node = scratch.get(from)?;
        let address = node
            .address
            .clone()
            .ok_or_else(|| Error::validation("cannot graft the top node"))?;
        let id = self.arena.attach(parent, &node.label, address)?;
        for child in node.children.values() {
            self.graft(scratch, *child, id)?;
        }
        Ok(id)
    }

    fn rebase(&mut self, id: ViewId, from: &NodeAddress, to: &NodeAddress) -> Result<()> {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let node = self.arena.get_mut(current)?;
            if let Some(rebased) = node.address.as_ref().and_then(|a| a.rebase(from, to)) {
                node.address = Some(rebased);
            }
            pending.extend(node.children.values().copied());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preftree_core_store::{address, StoreNode, TypedValue};
    use preftree_json_store::InMemoryStore;

    fn store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for a in ["User:/b/x", "User:/a", "System:/s/t/u"] {
            store.ensure_node(&a.parse().unwrap()).unwrap();
        }
        store
    }

    #[test]
    fn rebuild_mirrors_both_scopes() {
        let mut store = store();
        let mut view = ViewTreeSynchronizer::new();
        let top = view.rebuild(&mut store).unwrap();
        assert_eq!(view.label(top).unwrap(), "Preferences");
        assert_eq!(
            view.render(top).unwrap(),
            "Preferences\n  System\n    s\n      t\n        u\n  User\n    a\n    b\n      x\n"
        );
        assert_eq!(view.len(), 9);
    }

    #[test]
    fn scopes_are_listed_by_name() {
        let mut store = InMemoryStore::new();
        let mut view = ViewTreeSynchronizer::new();
        view.rebuild(&mut store).unwrap();
        let labels: Vec<String> = view
            .shape()
            .children
            .into_iter()
            .map(|shape| shape.label)
            .collect();
        assert_eq!(labels, vec!["System", "User"]);
    }

    #[test]
    fn find_walks_addresses() {
        let mut store = store();
        let mut view = ViewTreeSynchronizer::new();
        view.rebuild(&mut store).unwrap();

        let x = view.find(&address!("User:/b/x")).unwrap();
        assert_eq!(view.label(x).unwrap(), "x");
        assert_eq!(view.address(x).unwrap(), Some(&address!("User:/b/x")));
        let root = view.find(&address!("System:/")).unwrap();
        assert_eq!(view.label(root).unwrap(), "System");
        assert!(view.find(&address!("User:/nope")).is_none());
    }

    #[test]
    fn add_loads_subtree() {
        let mut store = store();
        let mut view = ViewTreeSynchronizer::new();
        view.rebuild(&mut store).unwrap();

        store.ensure_node(&address!("User:/c/d/e")).unwrap();
        let user = view.find(&address!("User:/")).unwrap();
        view.patch_after_add(&mut store, user, "c").unwrap();
        assert!(view.find(&address!("User:/c/d/e")).is_some());
        assert!(view.verify(&mut store).unwrap());
    }

    #[test]
    fn add_of_missing_node_leaves_view_alone() {
        let mut store = store();
        let mut view = ViewTreeSynchronizer::new();
        view.rebuild(&mut store).unwrap();
        let before = view.shape();

        let user = view.find(&address!("User:/")).unwrap();
        assert!(matches!(
            view.patch_after_add(&mut store, user, "ghost"),
            Err(Error::NotFound { .. })
        ));
        assert_eq!(view.shape(), before);
    }

    #[test]
    fn remove_frees_and_reuses_slots() {
        let mut store = store();
        let mut view = ViewTreeSynchronizer::new();
        view.rebuild(&mut store).unwrap();

        let b = view.find(&address!("User:/b")).unwrap();
        let x = view.find(&address!("User:/b/x")).unwrap();
        let node = store.get_node(&address!("User:/b")).unwrap();
        store.remove_node(&node).unwrap();
        view.patch_after_remove(b).unwrap();
        assert!(view.verify(&mut store).unwrap());
        assert!(matches!(view.label(x), Err(Error::NotFound { .. })));

        let slots = view.arena.slots.len();
        store.ensure_node(&address!("User:/n")).unwrap();
        let user = view.find(&address!("User:/")).unwrap();
        view.patch_after_add(&mut store, user, "n").unwrap();
        assert_eq!(view.arena.slots.len(), slots);
    }

    #[test]
    fn scope_roots_and_top_cannot_be_removed() {
        let mut store = store();
        let mut view = ViewTreeSynchronizer::new();
        view.rebuild(&mut store).unwrap();
        let user = view.find(&address!("User:/")).unwrap();
        assert!(view.patch_after_remove(user).is_err());
        assert!(view.patch_after_remove(view.top()).is_err());
    }

    #[test]
    fn move_rebases_descendants() {
        let mut store = store();
        let mut view = ViewTreeSynchronizer::new();
        view.rebuild(&mut store).unwrap();

        let b = view.find(&address!("User:/b")).unwrap();
        let t = view.find(&address!("System:/s/t")).unwrap();
        let moved = view.patch_after_move(b, t, "bee").unwrap();
        assert_eq!(moved, b);
        assert_eq!(
            view.address(view.find(&address!("System:/s/t/bee/x")).unwrap())
                .unwrap(),
            Some(&address!("System:/s/t/bee/x"))
        );
        assert!(view.find(&address!("User:/b")).is_none());
    }

    #[test]
    fn move_mismatches_are_reported() {
        let mut store = store();
        let mut view = ViewTreeSynchronizer::new();
        view.rebuild(&mut store).unwrap();

        let a = view.find(&address!("User:/a")).unwrap();
        let b = view.find(&address!("User:/b")).unwrap();
        let x = view.find(&address!("User:/b/x")).unwrap();
        let user = view.find(&address!("User:/")).unwrap();

        assert!(matches!(
            view.patch_after_move(a, user, "b"),
            Err(Error::Conflict { .. })
        ));
        assert!(matches!(
            view.patch_after_move(b, x, "loop"),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            view.patch_after_move(user, a, "u"),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn failed_rebuild_keeps_previous_view() {
        struct Broken;

        fn down<T>() -> Result<T> {
            Err(Error::unavailable("down"))
        }

        impl StoreAdapter for Broken {
            fn ensure_node(&mut self, _: &NodeAddress) -> Result<StoreNode> {
                down()
            }
            fn get_node(&mut self, _: &NodeAddress) -> Result<StoreNode> {
                down()
            }
            fn node_exists(&mut self, _: &NodeAddress) -> Result<bool> {
                down()
            }
            fn list_children(&mut self, _: &StoreNode) -> Result<Vec<String>> {
                down()
            }
            fn list_keys(&mut self, _: &StoreNode) -> Result<Vec<String>> {
                down()
            }
            fn get_raw(&mut self, _: &StoreNode, _: &str) -> Result<Option<String>> {
                down()
            }
            fn get_bytes(&mut self, _: &StoreNode, _: &str) -> Result<Option<Vec<u8>>> {
                down()
            }
            fn put_value(&mut self, _: &StoreNode, _: &str, _: TypedValue) -> Result<()> {
                down()
            }
            fn remove_key(&mut self, _: &StoreNode, _: &str) -> Result<()> {
                down()
            }
            fn remove_node(&mut self, _: &StoreNode) -> Result<()> {
                down()
            }
            fn sync(&mut self, _: &StoreNode) -> Result<()> {
                down()
            }
            fn flush(&mut self, _: &StoreNode) -> Result<()> {
                down()
            }
        }

        let mut store = store();
        let mut view = ViewTreeSynchronizer::new();
        view.rebuild(&mut store).unwrap();
        let before = view.shape();

        assert!(matches!(
            view.rebuild(&mut Broken),
            Err(Error::StoreUnavailable { .. })
        ));
        assert_eq!(view.shape(), before);
        assert!(view.verify(&mut store).unwrap());
    }
}
