use axum::extract::State;
use serde::Deserialize;

use crate::db::queries::{self, ProductFilter};
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{CreateProduct, Product, UpdateProduct};
use crate::util::{Paginated, Pagination};

#[derive(Debug, Deserialize)]
pub struct ProductPath {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProduct>,
) -> Result<Json<Product>> {
    input.validate()?;

    let conn = state.db.get()?;
    let product = queries::create_product(&conn, &input)?;

    tracing::info!(
        product_id = %product.id,
        url_code = %product.url_code,
        "created product {}",
        product.name
    );

    Ok(Json(product))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Paginated<Product>>> {
    let (limit, offset) = Pagination {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve();
    let filter = ProductFilter {
        active: query.active,
        search: query.search,
    };

    let conn = state.db.get()?;
    let (items, total) = queries::list_products_paginated(&conn, &filter, limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(path): Path<ProductPath>,
) -> Result<Json<Product>> {
    let conn = state.db.get()?;
    let product = queries::get_product_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(path): Path<ProductPath>,
    Json(input): Json<UpdateProduct>,
) -> Result<Json<Product>> {
    input.validate()?;

    let conn = state.db.get()?;
    queries::get_product_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    if queries::update_product(&conn, &path.id, &input)? {
        tracing::info!(product_id = %path.id, "updated product");
    }

    let product = queries::get_product_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(path): Path<ProductPath>,
) -> Result<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;

    let existing = queries::get_product_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    queries::delete_product(&mut conn, &path.id)?;

    tracing::info!(product_id = %path.id, "deleted product {}", existing.name);

    Ok(Json(serde_json::json!({ "deleted": true })))
}
