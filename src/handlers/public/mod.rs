mod pay;
mod product;

pub use pay::*;
pub use product::*;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::extractors::Json;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/product/{url_code}", get(product_detail))
        .route("/pay", get(verify_payment_link))
        .route("/pay/complete", post(complete_payment))
}
