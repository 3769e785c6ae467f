//! Catalog route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::ShopStore;
use crate::error::Result;
use crate::models::Product;
use crate::state::AppState;

/// Query parameters for catalog search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub name: String,
}

/// List the whole catalog.
#[instrument(skip(state))]
pub async fn index<S: ShopStore>(State(state): State<AppState<S>>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.store().list_products().await?))
}

/// Search the catalog by name fragment. An empty fragment lists everything.
#[instrument(skip(state))]
pub async fn search<S: ShopStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>> {
    let name = query.name.trim();
    let products = if name.is_empty() {
        state.store().list_products().await?
    } else {
        state.store().search_products(name).await?
    };
    tracing::debug!(results = products.len(), "Catalog search");
    Ok(Json(products))
}
