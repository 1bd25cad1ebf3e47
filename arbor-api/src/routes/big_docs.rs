//! Expanded Tree Routes
//!
//! Read-only views of whole trees with children inlined.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use arbor_core::DocumentId;

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /big-docs - Every root expanded into its tree
pub async fn list_big_docs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let trees = state.list_expanded_roots().await?;
    Ok(Json(trees))
}

/// GET /big-docs/:id - The subtree rooted at `id`
pub async fn get_big_doc(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> ApiResult<impl IntoResponse> {
    let tree = state.get_expanded_tree(id).await?;
    Ok(Json(tree))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_big_docs))
        .route("/:id", get(get_big_doc))
        .with_state(state)
}
