//! Signed, single-use payment links.
//!
//! A link token is `{payment_id}:{signature}` where `payment_id` is eight
//! random hex characters and `signature` is the first 16 hex characters of
//! HMAC-SHA256 over `{order_number}:{payment_id}:{issued_at}`. A link is good
//! for 30 minutes, only while its order is pending and was created within
//! the same window, and only until it is used.

use chrono::Utc;
use hmac::{Hmac, Mac};
use rusqlite::{Connection, TransactionBehavior};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::codes::MAX_ATTEMPTS;
use crate::config::PaymentSecret;
use crate::db::queries;
use crate::error::{AppError, Result, VerificationError};
use crate::models::{IssuedLink, Order};

type HmacSha256 = Hmac<Sha256>;

/// How long an issued link stays valid, and how old its order may be.
pub const LINK_TTL_SECS: i64 = 30 * 60;
pub const PAYMENT_ID_LEN: usize = 8;
const SIGNATURE_HEX_LEN: usize = 16;

/// Truncated hex HMAC binding an order number, payment id and issue time.
pub fn sign(
    order_number: &str,
    payment_id: &str,
    issued_at: i64,
    secret: &PaymentSecret,
) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("Invalid payment secret".into()))?;
    mac.update(format!("{}:{}:{}", order_number, payment_id, issued_at).as_bytes());
    let mut digest = hex::encode(mac.finalize().into_bytes());
    digest.truncate(SIGNATURE_HEX_LEN);
    Ok(digest)
}

pub fn new_payment_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(PAYMENT_ID_LEN);
    id
}

/// Split a token into `(payment_id, signature)`.
pub fn parse_token(token: &str) -> std::result::Result<(&str, &str), VerificationError> {
    let mut parts = token.trim().split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(sig), None) if !id.is_empty() && !sig.is_empty() => Ok((id, sig)),
        _ => Err(VerificationError::MalformedToken),
    }
}

/// Shareable URL for a token.
pub fn payment_url(base_url: &str, token: &str) -> String {
    format!(
        "{}/pay?token={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

/// Issue a new link for a pending order, replacing any earlier one.
pub fn issue_link(conn: &Connection, order_id: &str, secret: &PaymentSecret) -> Result<IssuedLink> {
    issue_link_drawing(conn, order_id, secret, new_payment_id, Utc::now().timestamp())
}

/// Draw payment ids from `next_id` until one is not held by another live
/// link.
fn issue_link_drawing(
    conn: &Connection,
    order_id: &str,
    secret: &PaymentSecret,
    mut next_id: impl FnMut() -> String,
    now: i64,
) -> Result<IssuedLink> {
    for _ in 0..MAX_ATTEMPTS {
        let payment_id = next_id();
        match issue_link_with_id(conn, order_id, secret, &payment_id, now) {
            Err(AppError::Database(ref e)) if queries::is_unique_violation(e) => {
                tracing::warn!("payment id collided with a live link, drawing another");
            }
            other => return other,
        }
    }
    Err(AppError::GenerationExhausted {
        attempts: MAX_ATTEMPTS,
    })
}

/// [`issue_link`] with a caller-chosen payment id and issue time.
pub fn issue_link_with_id(
    conn: &Connection,
    order_id: &str,
    secret: &PaymentSecret,
    payment_id: &str,
    now: i64,
) -> Result<IssuedLink> {
    if payment_id.chars().count() != PAYMENT_ID_LEN || payment_id.contains(':') {
        return Err(AppError::BadRequest(format!(
            "payment id must be {} characters without ':'",
            PAYMENT_ID_LEN
        )));
    }

    let order = queries::get_order_by_id(conn, order_id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    if order.payment_status.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "Cannot issue a payment link for a {} order",
            order.payment_status
        )));
    }

    let order_number = if order.order_number.is_empty() {
        queries::generate_order_number(conn)?
    } else {
        order.order_number
    };

    let signature = sign(&order_number, payment_id, now, secret)?;
    let token = format!("{}:{}", payment_id, signature);
    let expires_at = now + LINK_TTL_SECS;

    if !queries::set_payment_link(conn, order_id, &order_number, &token, now, expires_at)? {
        return Err(AppError::Conflict("Order is no longer pending".into()));
    }

    tracing::info!(
        order_number = %order_number,
        payment_id = %payment_id,
        expires_at,
        "issued payment link"
    );

    Ok(IssuedLink {
        token,
        issued_at: now,
        expires_at,
    })
}

/// Check a token against the store without changing anything.
pub fn verify_link(conn: &Connection, token: &str, secret: &PaymentSecret) -> Result<Order> {
    verify_link_at(conn, token, secret, Utc::now().timestamp())
}

/// [`verify_link`] evaluated at `now`.
pub fn verify_link_at(
    conn: &Connection,
    token: &str,
    secret: &PaymentSecret,
    now: i64,
) -> Result<Order> {
    let (payment_id, signature) = parse_token(token)?;

    let Some(order) = queries::find_linked_pending_order(conn, payment_id, now, LINK_TTL_SECS)?
    else {
        tracing::warn!(payment_id = %payment_id, "no live payment link for id");
        return Err(VerificationError::ExpiredOrInvalid.into());
    };

    let issued_at = order
        .payment_link_issued_at
        .ok_or(VerificationError::ExpiredOrInvalid)?;
    let expected = sign(&order.order_number, payment_id, issued_at, secret)?;
    if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
        tracing::warn!(payment_id = %payment_id, "payment link signature mismatch");
        return Err(VerificationError::ExpiredOrInvalid.into());
    }

    if order.payment_link_used {
        tracing::warn!(
            payment_id = %payment_id,
            order_number = %order.order_number,
            "payment link reused"
        );
        return Err(VerificationError::AlreadyUsed.into());
    }

    Ok(order)
}

/// Verify a token and, in the same transaction, mark its link used, move the
/// order to `paid` and count the purchase. Returns the paid order.
pub fn consume_payment_link(
    conn: &mut Connection,
    token: &str,
    secret: &PaymentSecret,
) -> Result<Order> {
    consume_payment_link_at(conn, token, secret, Utc::now().timestamp())
}

/// [`consume_payment_link`] with verification evaluated at `now`.
pub fn consume_payment_link_at(
    conn: &mut Connection,
    token: &str,
    secret: &PaymentSecret,
    now: i64,
) -> Result<Order> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let order = verify_link_at(&tx, token, secret, now)?;
    if !queries::mark_order_paid(&tx, &order.id, true)? {
        return Err(VerificationError::AlreadyUsed.into());
    }
    let paid = queries::get_order_by_id(&tx, &order.id)?
        .ok_or_else(|| AppError::Internal("Order vanished during payment".into()))?;

    tx.commit()?;

    tracing::info!(
        order_number = %paid.order_number,
        total_amount_cents = paid.total_amount_cents,
        "payment completed via link"
    );
    Ok(paid)
}
