//! Node addresses: a scope plus a path of segment names.
//!
//! The canonical string form is `<Scope>:/<seg1>/<seg2>` with the scope root
//! rendered as `<Scope>:/`. This is the one encoding every caller shares, so
//! `parse(render(scope, path))` must always give back `(scope, path)`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Separates the scope token from the path portion of an address.
pub const SCOPE_DELIMITER: char = ':';

/// Separates path segments.
pub const SEGMENT_DELIMITER: char = '/';

/// One of the two disjoint top-level trees.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
    User,
    System,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::User, Scope::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::User => "User",
            Scope::System => "System",
        }
    }

    /// Match a scope token, ignoring ASCII case.
    pub fn from_token(token: &str) -> Option<Scope> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Scope::from_token(s).ok_or_else(|| {
            Error::malformed(s, "scope must be one of \"User\" or \"System\"")
        })
    }
}

/// An ordered list of node names below a scope root.
///
/// The empty path is the scope root itself.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from segments, rejecting empty or delimiter-bearing names.
    pub fn try_from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        for (position, segment) in segments.iter().enumerate() {
            validate_segment(segment).map_err(|message| {
                Error::validation(format!(
                    "invalid node name '{}' at position {}: {}",
                    segment, position, message
                ))
            })?;
        }
        Ok(NodePath { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.segments.iter()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The last segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path one level up, or `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(NodePath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append one segment.
    pub fn child(&self, name: &str) -> Result<NodePath> {
        validate_segment(name).map_err(|message| {
            Error::validation(format!("invalid node name '{}': {}", name, message))
        })?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(NodePath { segments })
    }

    #[must_use]
    pub fn join(&self, other: &NodePath) -> NodePath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        NodePath { segments }
    }

    pub fn has_prefix(&self, prefix: &NodePath) -> bool {
        prefix.segments.len() <= self.segments.len()
            && prefix.segments == self.segments[..prefix.segments.len()]
    }

    #[must_use]
    pub fn strip_prefix(&self, prefix: &NodePath) -> Option<NodePath> {
        if self.has_prefix(prefix) {
            Some(NodePath {
                segments: self.segments[prefix.segments.len()..].to_vec(),
            })
        } else {
            None
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

fn validate_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty name");
    }
    if segment.contains(SEGMENT_DELIMITER) {
        return Err("contains '/'");
    }
    if segment.contains(SCOPE_DELIMITER) {
        return Err("contains ':'");
    }
    Ok(())
}

/// A scope and a path: the identity of one store node.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeAddress {
    pub scope: Scope,
    pub path: NodePath,
}

impl NodeAddress {
    pub fn new(scope: Scope, path: NodePath) -> Self {
        Self { scope, path }
    }

    pub fn root(scope: Scope) -> Self {
        Self {
            scope,
            path: NodePath::root(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }

    /// Node name, or the scope name for a scope root.
    pub fn name(&self) -> &str {
        self.path.name().unwrap_or(self.scope.as_str())
    }

    pub fn parent(&self) -> Option<NodeAddress> {
        self.path.parent().map(|path| NodeAddress {
            scope: self.scope,
            path,
        })
    }

    pub fn child(&self, name: &str) -> Result<NodeAddress> {
        Ok(NodeAddress {
            scope: self.scope,
            path: self.path.child(name)?,
        })
    }

    /// True if `self` is `other` or lies below it in the same scope.
    pub fn is_within(&self, other: &NodeAddress) -> bool {
        self.scope == other.scope && self.path.has_prefix(&other.path)
    }

    /// Rebase `self` from under `from` to under `to`.
    ///
    /// Returns `None` if `self` is not within `from`.
    pub fn rebase(&self, from: &NodeAddress, to: &NodeAddress) -> Option<NodeAddress> {
        if self.scope != from.scope {
            return None;
        }
        let suffix = self.path.strip_prefix(&from.path)?;
        Some(NodeAddress {
            scope: to.scope,
            path: to.path.join(&suffix),
        })
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self.scope, &self.path))
    }
}

impl FromStr for NodeAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

/// Render an address in canonical form.
///
/// ```rust
/// use preftree_core_store::{render, NodePath, Scope};
///
/// assert_eq!(render(Scope::User, &NodePath::root()), "User:/");
/// let path = NodePath::try_from_segments(["a", "b"]).unwrap();
/// assert_eq!(render(Scope::System, &path), "System:/a/b");
/// ```
pub fn render(scope: Scope, path: &NodePath) -> String {
    format!("{}{}{}", scope, SCOPE_DELIMITER, path)
}

/// Parse a canonical address string.
///
/// The scope token is matched case-insensitively; everything else is exact.
pub fn parse(address: &str) -> Result<NodeAddress> {
    let mut parts = address.split(SCOPE_DELIMITER);
    let (scope_token, path_part) = match (parts.next(), parts.next(), parts.next()) {
        (Some(scope), Some(path), None) => (scope, path),
        (_, None, _) => return Err(Error::malformed(address, "missing scope delimiter ':'")),
        _ => return Err(Error::malformed(address, "more than one ':'")),
    };

    let scope = Scope::from_token(scope_token).ok_or_else(|| {
        Error::malformed(
            address,
            format!("unknown scope '{}' (expected User or System)", scope_token),
        )
    })?;

    let rest = path_part
        .strip_prefix(SEGMENT_DELIMITER)
        .ok_or_else(|| Error::malformed(address, "path must start with '/'"))?;

    if rest.is_empty() {
        return Ok(NodeAddress::root(scope));
    }

    let mut segments = Vec::new();
    for (position, segment) in rest.split(SEGMENT_DELIMITER).enumerate() {
        if segment.is_empty() {
            return Err(Error::malformed(
                address,
                format!("empty path segment at position {}", position),
            ));
        }
        segments.push(segment.to_string());
    }

    Ok(NodeAddress {
        scope,
        path: NodePath { segments },
    })
}

/// Build an address from a literal, panicking if it is malformed.
///
/// ```rust
/// use preftree_core_store::{address, Scope};
///
/// let a = address!("User:/a/b");
/// assert_eq!(a.scope, Scope::User);
/// assert_eq!(a.path.len(), 2);
/// ```
#[macro_export]
macro_rules! address {
    ($s:expr) => {
        $crate::parse($s).expect("invalid address literal")
    };
}
