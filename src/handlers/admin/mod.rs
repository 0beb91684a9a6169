mod orders;
mod products;

pub use orders::*;
pub use products::*;

use axum::{
    Router,
    routing::{get, post},
};

use crate::db::AppState;

/// Catalog and order management. These routes carry no authentication of
/// their own; mount them behind whatever gate fronts the deployment.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/products", post(create_product).get(list_products))
        .route(
            "/admin/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/admin/orders", post(create_order).get(list_orders))
        .route("/admin/orders/{id}", get(get_order).put(update_order))
        .route(
            "/admin/orders/{id}/payment-link",
            post(issue_payment_link).delete(revoke_payment_link),
        )
        .route("/admin/orders/{id}/complete", post(complete_order))
        .route("/admin/orders/{id}/cancel", post(cancel_order))
}
