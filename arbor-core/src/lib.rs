//! Arbor Core - Document Types
//!
//! Data structures shared by every Arbor crate: the stored [`Document`],
//! its derived [`BigDocument`] expansion, the closed table of mutable
//! fields, the error taxonomy and the core configuration.

pub mod config;
pub mod document;
pub mod error;
pub mod field;

pub use config::{ArborConfig, CacheSettings, StoreSettings};
pub use document::{BigDocument, Document, DocumentUpdate, NewDocument};
pub use error::{
    ArborError, ArborResult, ConfigError, ErrorKind, StorageError, TreeError, ValidationError,
};
pub use field::{DocumentField, FieldChanges, FieldKind};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Document identifier assigned by the store on insert.
pub type DocumentId = i64;

/// Subtree height of a document (edges down to its deepest leaf).
pub type Depth = u32;

/// Parent id carried by documents that are roots of their own tree.
pub const ROOT_PARENT: DocumentId = 0;

/// Returns true if `id` denotes "no parent".
pub fn is_root_parent(id: DocumentId) -> bool {
    id == ROOT_PARENT
}
