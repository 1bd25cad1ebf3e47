//! Document entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArborResult, ValidationError};
use crate::field::{DocumentField, FieldChanges, FieldKind};
use crate::{Depth, DocumentId, ROOT_PARENT};

/// A stored tree node.
///
/// `depth` is the height of the subtree rooted here: 0 for a leaf,
/// otherwise one more than the deepest child. `child_list` keeps insertion
/// order for display and never contains duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Document {
    pub id: DocumentId,
    #[serde(default)]
    pub parent_id: DocumentId,
    #[serde(default)]
    pub depth: Depth,
    #[serde(default)]
    pub sort: i64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub child_list: Vec<DocumentId>,
}

impl Document {
    /// A childless root document with the given id and body.
    pub fn new(id: DocumentId, body: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: ROOT_PARENT,
            depth: 0,
            sort: 0,
            body: body.into(),
            child_list: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_PARENT
    }

    pub fn is_leaf(&self) -> bool {
        self.child_list.is_empty()
    }

    /// Child list with `child` removed, order preserved.
    pub fn children_without(&self, child: DocumentId) -> Vec<DocumentId> {
        self.child_list
            .iter()
            .copied()
            .filter(|id| *id != child)
            .collect()
    }
}

/// Payload for creating a document. The id is assigned by the store.
///
/// Children listed here are attached after the insert, subject to the same
/// validation as an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewDocument {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub sort: i64,
    #[serde(default)]
    pub child_list: Vec<DocumentId>,
}

impl NewDocument {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_children(mut self, children: Vec<DocumentId>) -> Self {
        self.child_list = children;
        self
    }

    /// The row as first inserted: a childless root. Children are attached
    /// in a second step so they go through attachment validation.
    pub fn into_row(self, id: DocumentId) -> Document {
        Document {
            id,
            parent_id: ROOT_PARENT,
            depth: 0,
            sort: self.sort,
            body: self.body,
            child_list: Vec::new(),
        }
    }
}

/// Externally requested update of a document.
///
/// Only the whitelisted fields (`Body`, `Sort`, `ChildList`) can be set
/// this way; `ParentId` and `Depth` are owned by the tree engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentUpdate {
    pub body: Option<String>,
    pub sort: Option<i64>,
    pub child_list: Option<Vec<DocumentId>>,
}

impl DocumentUpdate {
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_children(mut self, children: Vec<DocumentId>) -> Self {
        self.child_list = Some(children);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.sort.is_none() && self.child_list.is_none()
    }

    /// Build an update from a JSON object keyed by field name.
    ///
    /// Unknown names and engine-owned fields are ignored. A known field
    /// with a value of the wrong type is rejected.
    pub fn from_json(value: &Value) -> ArborResult<Self> {
        let object = value.as_object().ok_or_else(|| ValidationError::InvalidValue {
            field: "payload".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;

        let mut update = Self::default();
        for (name, raw) in object {
            let Some(kind) = FieldKind::from_name(name) else {
                continue;
            };
            if !kind.is_external() {
                continue;
            }
            match DocumentField::from_json(kind, raw)? {
                DocumentField::Body(body) => update.body = Some(body),
                DocumentField::Sort(sort) => update.sort = Some(sort),
                DocumentField::ChildList(children) => update.child_list = Some(children),
                DocumentField::ParentId(_) | DocumentField::Depth(_) => {}
            }
        }
        Ok(update)
    }

    /// Scalar changes, i.e. everything except the child list, which the
    /// tree engine reconciles separately.
    pub fn scalar_changes(&self) -> FieldChanges {
        let mut changes = FieldChanges::new();
        if let Some(body) = &self.body {
            changes.set(DocumentField::Body(body.clone()));
        }
        if let Some(sort) = self.sort {
            changes.set(DocumentField::Sort(sort));
        }
        changes
    }
}

/// Read-only recursive expansion of a document and its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BigDocument {
    pub id: DocumentId,
    pub body: String,
    pub sort: i64,
    pub child_list: Vec<BigDocument>,
}

impl BigDocument {
    pub fn leaf(doc: &Document) -> Self {
        Self {
            id: doc.id,
            body: doc.body.clone(),
            sort: doc.sort,
            child_list: Vec::new(),
        }
    }

    /// Number of nodes in the expansion, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.child_list.iter().map(BigDocument::node_count).sum::<usize>()
    }

    /// Height of the expansion, which matches the stored `Depth` of the root.
    pub fn height(&self) -> Depth {
        self.child_list
            .iter()
            .map(|child| child.height() + 1)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArborError;
    use serde_json::json;

    #[test]
    fn test_document_json_field_names() -> Result<(), serde_json::Error> {
        let mut doc = Document::new(7, "hello");
        doc.child_list = vec![8, 9];
        let value = serde_json::to_value(&doc)?;
        assert_eq!(value["Id"], json!(7));
        assert_eq!(value["ParentId"], json!(0));
        assert_eq!(value["Depth"], json!(0));
        assert_eq!(value["ChildList"], json!([8, 9]));
        Ok(())
    }

    #[test]
    fn test_new_document_into_row_drops_children() {
        let row = NewDocument::new("x").with_sort(3).with_children(vec![1, 2]).into_row(10);
        assert_eq!(row.id, 10);
        assert_eq!(row.sort, 3);
        assert!(row.is_root());
        assert!(row.child_list.is_empty());
    }

    #[test]
    fn test_update_from_json_applies_whitelist() -> ArborResult<()> {
        let update = DocumentUpdate::from_json(&json!({
            "Body": "new body",
            "ChildList": [4, 5],
            "Depth": 99,
            "ParentId": 3,
            "Unknown": true,
        }))?;
        assert_eq!(update.body.as_deref(), Some("new body"));
        assert_eq!(update.child_list, Some(vec![4, 5]));
        assert_eq!(update.sort, None);
        Ok(())
    }

    #[test]
    fn test_update_from_json_rejects_wrong_type() {
        let result = DocumentUpdate::from_json(&json!({ "Body": 12 }));
        assert!(matches!(result, Err(ArborError::Validation(_))));
    }

    #[test]
    fn test_update_from_json_rejects_non_object() {
        assert!(DocumentUpdate::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_scalar_changes_skip_child_list() {
        let update = DocumentUpdate::default()
            .with_body("b")
            .with_children(vec![1]);
        let changes = update.scalar_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get(FieldKind::Body), Some(&DocumentField::Body("b".into())));
    }

    #[test]
    fn test_big_document_height_and_count() {
        let leaf = BigDocument::leaf(&Document::new(3, "c"));
        let mid = BigDocument {
            id: 2,
            body: "b".into(),
            sort: 0,
            child_list: vec![leaf],
        };
        let root = BigDocument {
            id: 1,
            body: "a".into(),
            sort: 0,
            child_list: vec![mid, BigDocument::leaf(&Document::new(4, "d"))],
        };
        assert_eq!(root.height(), 2);
        assert_eq!(root.node_count(), 4);
    }

    #[test]
    fn test_children_without() {
        let mut doc = Document::new(1, "");
        doc.child_list = vec![2, 3, 4];
        assert_eq!(doc.children_without(3), vec![2, 4]);
        assert_eq!(doc.children_without(9), vec![2, 3, 4]);
    }
}
