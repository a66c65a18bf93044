//! Caller-level actions over a store and its view.
//!
//! A `Session` carries out one user action at a time: it performs the store
//! mutation, flushes it when configured to, and brings the view up to date.
//! Errors are logged before they are returned.

use std::fmt;

use preftree_core_store::{
    coerce, Entry, Error, NodeAddress, Result, StoreAdapter, StoreNode, TypeTag,
};

use crate::config::EngineConfig;
use crate::copier::{check_not_within, copy};
use crate::mover::MoveOrchestrator;
use crate::view::{ViewId, ViewTreeSynchronizer};

/// What a mutating action did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The mutation ran; carries the node it produced or affected.
    Applied(NodeAddress),
    /// Dry run: the mutation that would have run.
    Planned(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied(address) => write!(f, "{}", address),
            Outcome::Planned(description) => write!(f, "dry run: {}", description),
        }
    }
}

fn logged<T>(action: impl fmt::Display, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        log::error!("{} failed: {}", action, err);
    }
    result
}

pub struct Session {
    store: Box<dyn StoreAdapter>,
    config: EngineConfig,
    mover: MoveOrchestrator,
    view: ViewTreeSynchronizer,
}

impl Session {
    /// Open a session and load the view from `store`.
    pub fn open(mut store: Box<dyn StoreAdapter>, config: EngineConfig) -> Result<Session> {
        let mut view = ViewTreeSynchronizer::new();
        logged("loading view", view.rebuild(store.as_mut()))?;
        Ok(Session {
            store,
            mover: MoveOrchestrator::new(config.limits, config.destructive_actions),
            config,
            view,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn view(&self) -> &ViewTreeSynchronizer {
        &self.view
    }

    /// Direct store access, for collaborators such as import and export.
    /// Call `note_external_change` after mutating through it.
    pub fn store_mut(&mut self) -> &mut dyn StoreAdapter {
        self.store.as_mut()
    }

    pub fn add_node(&mut self, address: &NodeAddress) -> Result<Outcome> {
        let result = self.try_add_node(address);
        logged(format_args!("add node {}", address), result)
    }

    fn try_add_node(&mut self, address: &NodeAddress) -> Result<Outcome> {
        if self.config.dry_run {
            return Ok(self.planned(format!("create {}", address)));
        }
        let node = self.store.ensure_node(address)?;
        log::info!("Added node {}", node);
        self.show_added(address);
        self.settle(&node)?;
        Ok(Outcome::Applied(address.clone()))
    }

    pub fn remove_node(&mut self, address: &NodeAddress) -> Result<Outcome> {
        let result = self.try_remove_node(address);
        logged(format_args!("remove node {}", address), result)
    }

    fn try_remove_node(&mut self, address: &NodeAddress) -> Result<Outcome> {
        self.check_destructive("remove a node")?;
        if address.is_root() {
            return Err(Error::validation(format!(
                "scope root {} cannot be removed",
                address
            )));
        }
        if self.config.dry_run {
            return Ok(self.planned(format!("remove {} and everything below it", address)));
        }
        let node = self.store.get_node(address)?;
        self.store.remove_node(&node)?;
        log::info!("Removed node {}", address);

        let patched = match self.view.find(address) {
            Some(id) => self.view.patch_after_remove(id),
            None => Err(Error::node_not_found(address)),
        };
        self.repair_view(patched);

        if let Some(parent) = address.parent() {
            let parent = self.store.get_node(&parent)?;
            self.settle(&parent)?;
        }
        Ok(Outcome::Applied(address.clone()))
    }

    /// Store `raw_text` under `key`, parsed as `tag`.
    pub fn put_value(
        &mut self,
        address: &NodeAddress,
        key: &str,
        raw_text: &str,
        tag: TypeTag,
    ) -> Result<Outcome> {
        let result = self.try_put_value(address, key, raw_text, tag);
        logged(format_args!("put {} in {}", key, address), result)
    }

    fn try_put_value(
        &mut self,
        address: &NodeAddress,
        key: &str,
        raw_text: &str,
        tag: TypeTag,
    ) -> Result<Outcome> {
        let value = coerce(raw_text, tag)?;
        if self.config.dry_run {
            return Ok(self.planned(format!("set {} = {} ({}) in {}", key, value, tag, address)));
        }
        let node = self.store.get_node(address)?;
        self.store.put_value(&node, key, value)?;
        log::info!("Set {} ({}) in {}", key, tag, address);
        self.settle(&node)?;
        Ok(Outcome::Applied(address.clone()))
    }

    pub fn remove_key(&mut self, address: &NodeAddress, key: &str) -> Result<Outcome> {
        let result = self.try_remove_key(address, key);
        logged(format_args!("remove key {} from {}", key, address), result)
    }

    fn try_remove_key(&mut self, address: &NodeAddress, key: &str) -> Result<Outcome> {
        self.check_destructive("remove a key")?;
        if self.config.dry_run {
            return Ok(self.planned(format!("remove key {} from {}", key, address)));
        }
        let node = self.store.get_node(address)?;
        self.store.remove_key(&node, key)?;
        log::info!("Removed key {} from {}", key, address);
        self.settle(&node)?;
        Ok(Outcome::Applied(address.clone()))
    }

    /// The values table of a node: every key with its inferred type.
    pub fn get_entries(&mut self, address: &NodeAddress) -> Result<Vec<Entry>> {
        let result = self
            .store
            .get_node(address)
            .and_then(|node| self.store.read_entries(&node));
        logged(format_args!("read {}", address), result)
    }

    /// Child names of a node, in name order.
    pub fn list_children(&mut self, address: &NodeAddress) -> Result<Vec<String>> {
        let result = self
            .store
            .get_node(address)
            .and_then(|node| self.store.list_children(&node));
        logged(format_args!("list {}", address), result)
    }

    /// Copy the subtree at `source` into `destination`, creating it if needed.
    pub fn copy_node(&mut self, source: &NodeAddress, destination: &NodeAddress) -> Result<Outcome> {
        let result = self.try_copy_node(source, destination);
        logged(format_args!("copy {} to {}", source, destination), result)
    }

    fn try_copy_node(&mut self, source: &NodeAddress, destination: &NodeAddress) -> Result<Outcome> {
        check_not_within(source, destination)?;
        if self.config.dry_run {
            return Ok(self.planned(format!("copy {} into {}", source, destination)));
        }
        let source_node = self.store.get_node(source)?;
        let destination_node = self.store.ensure_node(destination)?;
        let copied = copy(self.store.as_mut(), &source_node, &destination_node);
        // even a failed copy may have written part of the subtree
        self.show_added(destination);
        copied?;
        log::info!("Copied {} to {}", source, destination);
        self.settle(&destination_node)?;
        Ok(Outcome::Applied(destination.clone()))
    }

    /// Move `source` to `destination_parent/new_name`.
    pub fn move_node(
        &mut self,
        source: &NodeAddress,
        destination_parent: &NodeAddress,
        new_name: &str,
    ) -> Result<Outcome> {
        let result = self.try_move_node(source, destination_parent, new_name);
        logged(
            format_args!("move {} to {}/{}", source, destination_parent, new_name),
            result,
        )
    }

    fn try_move_node(
        &mut self,
        source: &NodeAddress,
        destination_parent: &NodeAddress,
        new_name: &str,
    ) -> Result<Outcome> {
        if self.config.dry_run {
            let destination = destination_parent.child(new_name)?;
            check_not_within(source, &destination)?;
            return Ok(self.planned(format!("move {} to {}", source, destination)));
        }
        let source_node = self.store.get_node(source)?;
        let parent_node = self.store.get_node(destination_parent)?;
        let moved = self
            .mover
            .move_node(self.store.as_mut(), &source_node, &parent_node, new_name);
        self.finish_move(&source_node, &parent_node, new_name, moved)
    }

    /// Rename `source` within its current parent.
    pub fn rename_node(&mut self, source: &NodeAddress, new_name: &str) -> Result<Outcome> {
        let result = self.try_rename_node(source, new_name);
        logged(format_args!("rename {} to {}", source, new_name), result)
    }

    fn try_rename_node(&mut self, source: &NodeAddress, new_name: &str) -> Result<Outcome> {
        let parent = source
            .parent()
            .ok_or_else(|| Error::validation(format!("scope root {} cannot be renamed", source)))?;
        if self.config.dry_run {
            parent.child(new_name)?;
            return Ok(self.planned(format!("rename {} to {}", source, new_name)));
        }
        let source_node = self.store.get_node(source)?;
        let parent_node = self.store.get_node(&parent)?;
        let renamed = self.mover.rename(self.store.as_mut(), &source_node, new_name);
        self.finish_move(&source_node, &parent_node, new_name, renamed)
    }

    fn finish_move(
        &mut self,
        source: &StoreNode,
        parent: &StoreNode,
        new_name: &str,
        moved: Result<StoreNode>,
    ) -> Result<Outcome> {
        let destination = match moved {
            Ok(destination) => destination,
            Err(err) => {
                if err.is_partial_state() {
                    self.rebuild_view();
                }
                return Err(err);
            }
        };

        if self.mover.destructive_actions() {
            let patched = match (self.view.find(source.address()), self.view.find(parent.address())) {
                (Some(source_view), Some(parent_view)) => self
                    .view
                    .patch_after_move(source_view, parent_view, new_name)
                    .map(|_| ()),
                _ => Err(Error::node_not_found(source.address())),
            };
            self.repair_view(patched);
            // the source's old parent changed too
            if let Some(old_parent) = source.address().parent() {
                if old_parent != *parent.address() {
                    let old_parent = self.store.get_node(&old_parent)?;
                    self.settle(&old_parent)?;
                }
            }
        } else {
            self.show_added(destination.address());
        }
        self.settle(&destination)?;
        Ok(Outcome::Applied(destination.address().clone()))
    }

    /// Rebuild the view from the store.
    pub fn refresh(&mut self) -> Result<ViewId> {
        let result = self.view.rebuild(self.store.as_mut());
        logged("refresh", result)
    }

    /// Pull in changes made by others, then rebuild the view.
    pub fn sync(&mut self, address: &NodeAddress) -> Result<()> {
        let result = self
            .store
            .get_node(address)
            .and_then(|node| self.store.sync(&node))
            .and_then(|()| self.view.rebuild(self.store.as_mut()).map(|_| ()));
        logged(format_args!("sync {}", address), result)
    }

    pub fn flush(&mut self, address: &NodeAddress) -> Result<()> {
        let result = self
            .store
            .get_node(address)
            .and_then(|node| self.store.flush(&node));
        logged(format_args!("flush {}", address), result)
    }

    /// Bring the view and persistence up to date after `address` was written
    /// through `store_mut`.
    pub fn note_external_change(&mut self, address: &NodeAddress) -> Result<()> {
        self.show_added(address);
        let result = self
            .store
            .get_node(address)
            .and_then(|node| self.settle(&node));
        logged(format_args!("update after change to {}", address), result)
    }

    fn planned(&self, description: String) -> Outcome {
        log::info!("Dry run: would {}", description);
        Outcome::Planned(format!("would {}", description))
    }

    fn check_destructive(&self, action: &str) -> Result<()> {
        if self.config.destructive_actions {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "cannot {}: destructive actions are disabled",
                action
            )))
        }
    }

    fn settle(&mut self, node: &StoreNode) -> Result<()> {
        if self.config.flush_after_mutation {
            self.store.flush(node)?;
        }
        Ok(())
    }

    /// Show a node that now exists at `address`, along with any of its
    /// ancestors the view is missing.
    fn show_added(&mut self, address: &NodeAddress) {
        let patched = self.patch_added(address);
        self.repair_view(patched);
    }

    fn patch_added(&mut self, address: &NodeAddress) -> Result<()> {
        // the highest node on the way down that the view does not show yet
        let mut target = address.clone();
        let mut prefix = NodeAddress::root(address.scope);
        for segment in address.path.iter() {
            prefix = prefix.child(segment)?;
            if self.view.find(&prefix).is_none() {
                target = prefix;
                break;
            }
        }

        let parent = target.parent().ok_or_else(|| {
            Error::validation(format!("scope root {} is always shown", target))
        })?;
        let parent_view = self
            .view
            .find(&parent)
            .ok_or_else(|| Error::node_not_found(&parent))?;
        self.view
            .patch_after_add(self.store.as_mut(), parent_view, target.name())?;
        Ok(())
    }

    /// Fall back to a rebuild when a patch could not be applied.
    ///
    /// The store mutation already succeeded at this point, so a failed
    /// rebuild is logged rather than returned.
    fn repair_view<T>(&mut self, patched: Result<T>) {
        if let Err(err) = patched {
            log::warn!("View patch failed ({}), rebuilding", err);
            self.rebuild_view();
        }
    }

    fn rebuild_view(&mut self) {
        if let Err(err) = self.view.rebuild(self.store.as_mut()) {
            log::error!("View rebuild failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preftree_core_store::{address, TypedValue};
    use preftree_json_store::InMemoryStore;

    fn session(config: EngineConfig) -> Session {
        Session::open(Box::new(InMemoryStore::new()), config).unwrap()
    }

    fn assert_view_matches(session: &mut Session) {
        let fresh = {
            let mut view = ViewTreeSynchronizer::new();
            view.rebuild(session.store_mut()).unwrap();
            view.shape()
        };
        assert_eq!(session.view().shape(), fresh);
    }

    #[test]
    fn add_node_shows_intermediates() {
        let mut s = session(EngineConfig::default());
        let outcome = s.add_node(&address!("User:/a/b/c")).unwrap();
        assert_eq!(outcome, Outcome::Applied(address!("User:/a/b/c")));
        assert!(s.view().find(&address!("User:/a/b/c")).is_some());
        assert_view_matches(&mut s);

        // adding an existing node is harmless
        s.add_node(&address!("User:/a")).unwrap();
        assert_view_matches(&mut s);
    }

    #[test]
    fn put_value_coerces_declared_type() {
        let mut s = session(EngineConfig::default());
        s.add_node(&address!("System:/n")).unwrap();
        s.put_value(&address!("System:/n"), "count", "12", TypeTag::Int64)
            .unwrap();
        assert!(matches!(
            s.put_value(&address!("System:/n"), "count", "twelve", TypeTag::Int32),
            Err(Error::ValueFormat { .. })
        ));
        assert!(matches!(
            s.put_value(&address!("System:/missing"), "k", "v", TypeTag::Text),
            Err(Error::NotFound { .. })
        ));

        let entries = s.get_entries(&address!("System:/n")).unwrap();
        assert_eq!(
            entries,
            vec![Entry {
                key: "count".to_string(),
                tag: TypeTag::Int32,
                raw_text: "12".to_string()
            }]
        );
    }

    #[test]
    fn remove_node_and_key() {
        let mut s = session(EngineConfig::default());
        s.add_node(&address!("User:/gone/child")).unwrap();
        s.put_value(&address!("User:/gone"), "k", "v", TypeTag::Text)
            .unwrap();
        s.remove_key(&address!("User:/gone"), "k").unwrap();
        assert!(s.get_entries(&address!("User:/gone")).unwrap().is_empty());

        s.remove_node(&address!("User:/gone")).unwrap();
        assert!(s.view().find(&address!("User:/gone")).is_none());
        assert_view_matches(&mut s);
        assert!(matches!(
            s.remove_node(&address!("User:/")),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn copy_keeps_source() {
        let mut s = session(EngineConfig::default());
        s.add_node(&address!("User:/src/inner")).unwrap();
        s.put_value(&address!("User:/src"), "flag", "TRUE", TypeTag::Boolean)
            .unwrap();
        s.copy_node(&address!("User:/src"), &address!("System:/dst"))
            .unwrap();

        assert!(s.view().find(&address!("User:/src/inner")).is_some());
        assert!(s.view().find(&address!("System:/dst/inner")).is_some());
        assert_eq!(
            s.get_entries(&address!("System:/dst")).unwrap()[0].raw_text,
            "true"
        );
        assert_view_matches(&mut s);

        assert!(matches!(
            s.copy_node(&address!("User:/src"), &address!("User:/src/inner/x")),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn move_and_rename_patch_the_view() {
        let mut s = session(EngineConfig::default());
        s.add_node(&address!("User:/a/b")).unwrap();
        s.add_node(&address!("System:/t")).unwrap();

        s.move_node(&address!("User:/a"), &address!("System:/t"), "a")
            .unwrap();
        assert!(s.view().find(&address!("System:/t/a/b")).is_some());
        assert_view_matches(&mut s);

        let outcome = s.rename_node(&address!("System:/t/a"), "z").unwrap();
        assert_eq!(outcome, Outcome::Applied(address!("System:/t/z")));
        assert_view_matches(&mut s);

        assert!(matches!(
            s.rename_node(&address!("System:/"), "x"),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn non_destructive_move_is_a_copy() {
        let mut s = session(EngineConfig {
            destructive_actions: false,
            ..EngineConfig::default()
        });
        s.add_node(&address!("User:/a")).unwrap();
        s.move_node(&address!("User:/a"), &address!("User:/"), "b")
            .unwrap();
        assert!(s.view().find(&address!("User:/a")).is_some());
        assert!(s.view().find(&address!("User:/b")).is_some());
        assert_view_matches(&mut s);

        assert!(matches!(
            s.remove_node(&address!("User:/a")),
            Err(Error::Validation { .. })
        ));
        assert!(s.remove_key(&address!("User:/a"), "k").is_err());
    }

    #[test]
    fn dry_run_changes_nothing() {
        let mut s = session(EngineConfig {
            dry_run: true,
            ..EngineConfig::default()
        });
        let outcome = s.add_node(&address!("User:/x")).unwrap();
        assert_eq!(outcome, Outcome::Planned("would create User:/x".to_string()));
        assert!(!s.store_mut().node_exists(&address!("User:/x")).unwrap());
        assert!(matches!(
            s.move_node(&address!("User:/x"), &address!("User:/x"), "y"),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            s.put_value(&address!("User:/x"), "k", "nope", TypeTag::Boolean),
            Err(Error::ValueFormat { .. })
        ));
        assert!(matches!(
            s.rename_node(&address!("User:/x"), "bad/name"),
            Err(Error::Validation { .. })
        ));
        assert_eq!(
            s.rename_node(&address!("User:/x"), "good").unwrap(),
            Outcome::Planned("would rename User:/x to good".to_string())
        );
    }

    #[test]
    fn external_changes_are_picked_up() {
        let mut s = session(EngineConfig::default());
        let node = s.store_mut().ensure_node(&address!("User:/ext/deep")).unwrap();
        s.store_mut()
            .put_value(&node, "k", TypedValue::Int32(1))
            .unwrap();
        assert!(s.view().find(&address!("User:/ext")).is_none());

        s.note_external_change(&address!("User:/ext/deep")).unwrap();
        assert!(s.view().find(&address!("User:/ext/deep")).is_some());

        s.store_mut().ensure_node(&address!("System:/other")).unwrap();
        s.refresh().unwrap();
        assert_view_matches(&mut s);
    }
}
