//! Document REST Routes
//!
//! CRUD over flat documents. Tree structure changes go through the
//! `ChildList` field of create and update payloads.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::Value;

use arbor_core::{DocumentId, DocumentUpdate, NewDocument};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /docs - Every stored document in id order
pub async fn list_docs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let docs = state.list_documents().await?;
    Ok(Json(docs))
}

/// GET /docs/:id - Get one document
pub async fn get_doc(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> ApiResult<impl IntoResponse> {
    let doc = state
        .find_document(id)
        .await?
        .ok_or_else(|| ApiError::document_not_found(id))?;
    Ok(Json(doc))
}

/// POST /docs - Create a document, attaching any children it lists
pub async fn create_doc(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    if !payload.is_object() {
        return Err(ApiError::invalid_input("Expected a JSON object"));
    }
    let draft: NewDocument = serde_json::from_value(payload)?;
    let doc = state.create_document(draft).await?;
    tracing::info!(id = doc.id, children = doc.child_list.len(), "document created");
    Ok((StatusCode::CREATED, Json(doc)))
}

/// PUT /docs/:id - Update `Body`, `Sort` and/or `ChildList`
pub async fn update_doc(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    Json(payload): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let update = DocumentUpdate::from_json(&payload)?;
    let doc = state.update_document(id, update).await?;
    Ok(Json(doc))
}

/// DELETE /docs/:id - Delete a document and its subtree
pub async fn delete_doc(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> ApiResult<StatusCode> {
    state.delete_document(id).await?;
    tracing::info!(id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the document routes router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_docs).post(create_doc))
        .route("/:id", get(get_doc).put(update_doc).delete(delete_doc))
        .with_state(state)
}
