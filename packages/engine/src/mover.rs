//! Move and rename built from ensure, copy and remove.
//!
//! Backing stores have no move primitive, so a move is three separate store
//! operations. None of them is retried and nothing is rolled back; each way
//! of failing part-way has its own error so callers know what state the
//! store was left in.

use preftree_core_store::{Error, Limits, Result, StoreAdapter, StoreNode};

use crate::copier::{check_not_within, copy};

#[derive(Clone, Debug)]
pub struct MoveOrchestrator {
    limits: Limits,
    destructive_actions: bool,
}

impl Default for MoveOrchestrator {
    fn default() -> Self {
        Self::new(Limits::default(), true)
    }
}

impl MoveOrchestrator {
    /// With `destructive_actions` off, moves stop after the copy and leave
    /// the source in place.
    pub fn new(limits: Limits, destructive_actions: bool) -> Self {
        Self {
            limits,
            destructive_actions,
        }
    }

    pub fn destructive_actions(&self) -> bool {
        self.destructive_actions
    }

    /// Move `source` to `destination_parent/new_name`.
    ///
    /// Fails with:
    /// - `Validation` if the source is a scope root, the destination lies
    ///   inside the source, or `new_name` is not a usable node name;
    /// - `Conflict` if the destination already exists (nothing is touched);
    /// - the store's error if the destination cannot be created;
    /// - `PartialCopy` if copying fails (the destination may hold part of the
    ///   source);
    /// - `DuplicateAfterMove` if the source cannot be removed after a complete
    ///   copy (both now hold the data).
    pub fn move_node<S: StoreAdapter + ?Sized>(
        &self,
        store: &mut S,
        source: &StoreNode,
        destination_parent: &StoreNode,
        new_name: &str,
    ) -> Result<StoreNode> {
        if source.is_root() {
            return Err(Error::validation(format!(
                "scope root {} cannot be moved",
                source
            )));
        }
        self.limits.check_name(new_name)?;
        let destination_address = destination_parent.address().child(new_name)?;
        check_not_within(source.address(), &destination_address)?;

        if store.node_exists(&destination_address)? {
            return Err(Error::Conflict {
                address: destination_address,
            });
        }

        let destination = store.ensure_node(&destination_address)?;

        if let Err(cause) = copy(store, source, &destination) {
            log::warn!(
                "Copy of {} into {} failed part-way: {}",
                source,
                destination,
                cause
            );
            return Err(Error::PartialCopy {
                source_address: source.address().clone(),
                destination: destination_address,
                cause: Box::new(cause),
            });
        }

        if !self.destructive_actions {
            log::info!(
                "Destructive actions disabled, leaving {} in place after copying to {}",
                source,
                destination
            );
            return Ok(destination);
        }

        if let Err(cause) = store.remove_node(source) {
            log::warn!(
                "{} was copied to {} but could not be removed: {}",
                source,
                destination,
                cause
            );
            return Err(Error::DuplicateAfterMove {
                source_address: source.address().clone(),
                destination: destination_address,
                cause: Box::new(cause),
            });
        }

        log::info!("Moved {} to {}", source, destination);
        Ok(destination)
    }

    /// Move `source` to a new name under its current parent.
    pub fn rename<S: StoreAdapter + ?Sized>(
        &self,
        store: &mut S,
        source: &StoreNode,
        new_name: &str,
    ) -> Result<StoreNode> {
        let parent_address = source.address().parent().ok_or_else(|| {
            Error::validation(format!("scope root {} cannot be renamed", source))
        })?;
        let parent = store.get_node(&parent_address)?;
        self.move_node(store, source, &parent, new_name)
    }
}
