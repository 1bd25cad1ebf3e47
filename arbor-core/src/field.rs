//! Closed table of document fields that can change after insert.
//!
//! Updates travel between the tree engine, the action buffer and the cache
//! as typed [`DocumentField`] values rather than name/value pairs, so every
//! setter is a `match` arm and unknown names never reach a document.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::document::Document;
use crate::error::{ArborResult, ValidationError};
use crate::{Depth, DocumentId};

/// Mutable field discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    ParentId,
    Depth,
    Sort,
    Body,
    ChildList,
}

impl FieldKind {
    pub const ALL: [FieldKind; 5] = [
        FieldKind::ParentId,
        FieldKind::Depth,
        FieldKind::Sort,
        FieldKind::Body,
        FieldKind::ChildList,
    ];

    /// Wire name of the field.
    pub fn as_name(&self) -> &'static str {
        match self {
            FieldKind::ParentId => "ParentId",
            FieldKind::Depth => "Depth",
            FieldKind::Sort => "Sort",
            FieldKind::Body => "Body",
            FieldKind::ChildList => "ChildList",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_name() == name)
    }

    /// Whether callers outside the tree engine may set this field.
    pub fn is_external(&self) -> bool {
        matches!(self, FieldKind::Sort | FieldKind::Body | FieldKind::ChildList)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_name())
    }
}

/// A new value for one mutable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentField {
    ParentId(DocumentId),
    Depth(Depth),
    Sort(i64),
    Body(String),
    ChildList(Vec<DocumentId>),
}

impl DocumentField {
    pub fn kind(&self) -> FieldKind {
        match self {
            DocumentField::ParentId(_) => FieldKind::ParentId,
            DocumentField::Depth(_) => FieldKind::Depth,
            DocumentField::Sort(_) => FieldKind::Sort,
            DocumentField::Body(_) => FieldKind::Body,
            DocumentField::ChildList(_) => FieldKind::ChildList,
        }
    }

    /// Write this value into `doc`.
    pub fn apply_to(&self, doc: &mut Document) {
        match self {
            DocumentField::ParentId(parent_id) => doc.parent_id = *parent_id,
            DocumentField::Depth(depth) => doc.depth = *depth,
            DocumentField::Sort(sort) => doc.sort = *sort,
            DocumentField::Body(body) => doc.body.clone_from(body),
            DocumentField::ChildList(children) => doc.child_list.clone_from(children),
        }
    }

    /// Decode a JSON value for the given field.
    pub fn from_json(kind: FieldKind, raw: &Value) -> ArborResult<Self> {
        let invalid = |reason: &str| ValidationError::InvalidValue {
            field: kind.as_name().to_string(),
            reason: reason.to_string(),
        };

        let field = match kind {
            FieldKind::ParentId => {
                DocumentField::ParentId(raw.as_i64().ok_or_else(|| invalid("expected an integer id"))?)
            }
            FieldKind::Depth => {
                let depth = raw
                    .as_u64()
                    .and_then(|d| Depth::try_from(d).ok())
                    .ok_or_else(|| invalid("expected a non-negative integer"))?;
                DocumentField::Depth(depth)
            }
            FieldKind::Sort => {
                DocumentField::Sort(raw.as_i64().ok_or_else(|| invalid("expected an integer"))?)
            }
            FieldKind::Body => DocumentField::Body(
                raw.as_str()
                    .ok_or_else(|| invalid("expected a string"))?
                    .to_string(),
            ),
            FieldKind::ChildList => {
                let items = raw
                    .as_array()
                    .ok_or_else(|| invalid("expected an array of ids"))?;
                let children = items
                    .iter()
                    .map(|item| item.as_i64().ok_or_else(|| invalid("expected an array of ids")))
                    .collect::<Result<Vec<_>, _>>()?;
                DocumentField::ChildList(children)
            }
        };
        Ok(field)
    }
}

/// Set of field changes for one document; a later value for the same
/// field replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldChanges {
    fields: BTreeMap<FieldKind, DocumentField>,
}

impl FieldChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: DocumentField) -> Self {
        let mut changes = Self::new();
        changes.set(field);
        changes
    }

    pub fn set(&mut self, field: DocumentField) {
        self.fields.insert(field.kind(), field);
    }

    pub fn get(&self, kind: FieldKind) -> Option<&DocumentField> {
        self.fields.get(&kind)
    }

    /// Fold `other` into `self`; fields present in both take `other`'s value.
    pub fn merge(&mut self, other: FieldChanges) {
        self.fields.extend(other.fields);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentField> {
        self.fields.values()
    }

    pub fn apply_to(&self, doc: &mut Document) {
        for field in self.fields.values() {
            field.apply_to(doc);
        }
    }
}

impl FromIterator<DocumentField> for FieldChanges {
    fn from_iter<I: IntoIterator<Item = DocumentField>>(iter: I) -> Self {
        let mut changes = Self::new();
        for field in iter {
            changes.set(field);
        }
        changes
    }
}
