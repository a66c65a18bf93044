//! Reference `StoreAdapter` implementations and the JSON interchange format.
//!
//! - `InMemoryStore`: both scopes held in memory, nothing persisted
//! - `JsonFileStore`: the same trees persisted as one JSON document
//! - `interchange`: export/import of a node or subtree as JSON

pub mod forest;
pub mod in_memory;
pub mod interchange;
pub mod local_disk;

pub use forest::{Forest, NodeData, Slot};
pub use in_memory::InMemoryStore;
pub use interchange::{export, from_json, import, import_at, to_json, ExportDepth, ExportDocument};
pub use local_disk::JsonFileStore;
