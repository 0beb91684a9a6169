use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, OrderFilter};
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::links;
use crate::models::{CreateOrder, Order, PaymentStatus, UpdateOrder};
use crate::util::{Paginated, Pagination};

#[derive(Debug, Deserialize)]
pub struct OrderPath {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub status: Option<PaymentStatus>,
    #[serde(default)]
    pub customer_service: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaymentLinkResponse {
    pub order_number: String,
    pub token: String,
    pub url: String,
    pub expires_at: i64,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(input): Json<CreateOrder>,
) -> Result<Json<Order>> {
    input.validate()?;

    let conn = state.db.get()?;
    let product = queries::get_product_by_id(&conn, &input.product_id)?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;

    let order = queries::create_order(&conn, &product, &input)?;

    tracing::info!(
        order_number = %order.order_number,
        payment_code = %order.payment_code,
        product_id = %product.id,
        "created order"
    );

    Ok(Json(order))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Paginated<Order>>> {
    let (limit, offset) = Pagination {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve();
    let filter = OrderFilter {
        status: query.status,
        customer_service: query.customer_service,
        search: query.search,
    };

    let conn = state.db.get()?;
    let (items, total) = queries::list_orders_paginated(&conn, &filter, limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(path): Path<OrderPath>,
) -> Result<Json<Order>> {
    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(Json(order))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(path): Path<OrderPath>,
    Json(input): Json<UpdateOrder>,
) -> Result<Json<Order>> {
    input.validate()?;

    let conn = state.db.get()?;
    queries::get_order_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    queries::update_order_details(&conn, &path.id, input.customer_service, input.notes)?;

    let order = queries::get_order_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(Json(order))
}

/// Issue (or reissue) the payment link for a pending order.
pub async fn issue_payment_link(
    State(state): State<AppState>,
    Path(path): Path<OrderPath>,
) -> Result<Json<PaymentLinkResponse>> {
    let conn = state.db.get()?;
    let issued = links::issue_link(&conn, &path.id, &state.payment_secret)?;

    let order = queries::get_order_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    Ok(Json(PaymentLinkResponse {
        order_number: order.order_number,
        url: links::payment_url(&state.base_url, &issued.token),
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// Mark an order paid without going through its link.
pub async fn complete_order(
    State(state): State<AppState>,
    Path(path): Path<OrderPath>,
) -> Result<Json<Order>> {
    let mut conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    if order.payment_status.is_terminal() || !queries::complete_payment(&mut conn, &path.id)? {
        return Err(AppError::Conflict(format!(
            "Order {} is not pending",
            order.order_number
        )));
    }

    tracing::info!(order_number = %order.order_number, "order marked paid");

    let order = queries::get_order_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(Json(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(path): Path<OrderPath>,
) -> Result<Json<Order>> {
    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    if order.payment_status.is_terminal() || !queries::cancel_order(&conn, &path.id)? {
        return Err(AppError::Conflict(format!(
            "Order {} is not pending",
            order.order_number
        )));
    }

    tracing::info!(order_number = %order.order_number, "order canceled");

    let order = queries::get_order_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(Json(order))
}

/// Revoke the order's current link without changing its status.
pub async fn revoke_payment_link(
    State(state): State<AppState>,
    Path(path): Path<OrderPath>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &path.id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    let revoked = queries::mark_payment_link_used(&conn, &order.id)?;
    if revoked {
        tracing::info!(order_number = %order.order_number, "payment link revoked");
    }

    Ok(Json(serde_json::json!({ "revoked": revoked })))
}
