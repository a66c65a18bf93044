//! Shell state: the session being driven and the current node.
//!
//! Addresses typed at the prompt are resolved against the current node:
//!
//! - `User:/a/b` or `system:/x` - absolute, scope parsed case-insensitively
//! - `/a/b` - from the root of the current scope
//! - `a/b`, `../c`, `.` - relative to the current node

use preftree_core_store::{parse, NodeAddress, Scope, SCOPE_DELIMITER};
use preftree_engine::Session;

#[derive(thiserror::Error, Debug)]
pub enum ContextError {
    #[error("{0}")]
    Store(#[from] preftree_core_store::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Manages the session and the current node.
pub struct ShellContext {
    session: Session,
    current: NodeAddress,
}

impl ShellContext {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            current: NodeAddress::root(Scope::User),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn current(&self) -> &NodeAddress {
        &self.current
    }

    /// Change the current node. The node must exist.
    pub fn set_current(&mut self, address: NodeAddress) -> Result<(), ContextError> {
        self.session.list_children(&address)?;
        self.current = address;
        Ok(())
    }

    /// Resolve `input` against the current node. Empty input is the current
    /// node.
    pub fn resolve(&self, input: &str) -> Result<NodeAddress, ContextError> {
        let input = input.trim();
        if input.is_empty() || input == "." {
            return Ok(self.current.clone());
        }
        if is_absolute(input) {
            return Ok(parse(input)?);
        }

        let (mut address, rest) = match input.strip_prefix('/') {
            Some(rest) => (NodeAddress::root(self.current.scope), rest),
            None => (self.current.clone(), input),
        };
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            address = match segment {
                "." => address,
                ".." => address
                    .parent()
                    .ok_or_else(|| ContextError::InvalidPath(format!("'{}' goes above the scope root", input)))?,
                name => address.child(name)?,
            };
        }
        Ok(address)
    }

    /// Keep the current node valid after `removed` was deleted.
    pub(crate) fn forget(&mut self, removed: &NodeAddress) {
        if self.current.is_within(removed) {
            self.current = removed
                .parent()
                .unwrap_or_else(|| NodeAddress::root(removed.scope));
        }
    }

    /// Follow the current node when it moved from `from` to `to`.
    pub(crate) fn follow(&mut self, from: &NodeAddress, to: &NodeAddress) {
        if let Some(rebased) = self.current.rebase(from, to) {
            self.current = rebased;
        }
    }
}

fn is_absolute(input: &str) -> bool {
    input
        .split_once(SCOPE_DELIMITER)
        .is_some_and(|(scope, _)| Scope::from_token(scope).is_some())
}
