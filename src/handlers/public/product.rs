use axum::extract::State;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::models::PublicProduct;

#[derive(Debug, Deserialize)]
pub struct ProductCodePath {
    pub url_code: String,
}

/// Public product page data, looked up by the product's shareable code.
/// Each successful view bumps the product's view counter.
pub async fn product_detail(
    State(state): State<AppState>,
    Path(path): Path<ProductCodePath>,
) -> Result<Json<PublicProduct>> {
    let conn = state.db.get()?;

    let product = queries::get_product_by_url_code(&conn, &path.url_code)?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    queries::increment_view_count(&conn, &product.id)?;

    Ok(Json(product.into()))
}
