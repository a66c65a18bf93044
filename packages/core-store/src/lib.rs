//! Core preftree types: addresses, typed values, and the store interface.
//!
//! - `NodeAddress`: a scope plus a node path, with the canonical
//!   `<Scope>:/<seg>/<seg>` string encoding
//! - `TypedValue`: one of seven scalar types, plus type inference for text
//! - `StoreAdapter`: the operations the engine needs from a backing store
//! - `Limits`: key, value and node-name size limits stores enforce
//!
//! # Example
//!
//! ```rust
//! use preftree_core_store::{address, StoreAdapter, TypedValue, Result};
//!
//! fn set_flag(store: &mut dyn StoreAdapter) -> Result<()> {
//!     let node = store.ensure_node(&address!("User:/com/example"))?;
//!     store.put_value(&node, "enabled", TypedValue::Boolean(true))
//! }
//! ```

mod adapter;
mod address;
mod error;
mod limits;
mod value;

#[cfg(feature = "test-utils")]
pub mod test_suite;

pub use adapter::{Entry, StoreAdapter, StoreNode};
pub use address::{parse, render, NodeAddress, NodePath, Scope, SCOPE_DELIMITER, SEGMENT_DELIMITER};
pub use error::{Error, Result};
pub use limits::{Limits, MAX_KEY_LENGTH, MAX_NAME_LENGTH, MAX_VALUE_LENGTH};
pub use value::{coerce, infer_type, TypeTag, TypedValue};
