//! The preftree engine: subtree copy, move and rename over a store that has
//! no move primitive, and a view of the store kept in step with it.
//!
//! - `copier`: recursive copy of keys and descendants
//! - `mover`: move/rename as ensure, copy, remove with distinct partial-failure errors
//! - `view`: arena-backed mirror of both scope trees, patched after each mutation
//! - `session`: caller-level actions tying the above to an `EngineConfig`

pub mod config;
pub mod copier;
pub mod mover;
pub mod session;
pub mod view;

pub use config::EngineConfig;
pub use copier::{check_not_within, copy};
pub use mover::MoveOrchestrator;
pub use session::{Outcome, Session};
pub use view::{ViewId, ViewShape, ViewTreeSynchronizer, TOP_LABEL};
