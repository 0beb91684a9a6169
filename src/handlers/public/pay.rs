use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::links;
use crate::models::OrderSummary;

#[derive(Debug, Deserialize)]
pub struct PayQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CompletePaymentRequest {
    pub token: String,
}

/// Check a payment link. Read-only: opening a link any number of times
/// leaves the order untouched.
pub async fn verify_payment_link(
    State(state): State<AppState>,
    Query(query): Query<PayQuery>,
) -> Result<Json<OrderSummary>> {
    let conn = state.db.get()?;
    let order = links::verify_link(&conn, &query.token, &state.payment_secret)?;
    Ok(Json(order.into()))
}

/// Consume a payment link: the order becomes paid and the link dead.
pub async fn complete_payment(
    State(state): State<AppState>,
    Json(request): Json<CompletePaymentRequest>,
) -> Result<Json<OrderSummary>> {
    let mut conn = state.db.get()?;
    let order = links::consume_payment_link(&mut conn, &request.token, &state.payment_secret)?;
    Ok(Json(order.into()))
}
