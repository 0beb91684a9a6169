//! Payment link tests - issuance, verification failures and single-use consumption

use rusqlite::params;

mod common;
use common::*;

use xfb_pay::error::{AppError, VerificationError};
use xfb_pay::links::{self, LINK_TTL_SECS};

fn setup() -> (DbPool, Order) {
    let pool = create_test_pool();
    let order = {
        let conn = pool.get().unwrap();
        let product = create_test_product(&conn, "Contract Pack", 9900);
        create_test_order(&conn, &product)
    };
    (pool, order)
}

fn assert_verification(result: Result<Order, AppError>, expected: VerificationError) {
    match result {
        Err(AppError::Verification(e)) => assert_eq!(e, expected),
        other => panic!("expected {:?}, got {:?}", expected, other),
    }
}

#[test]
fn test_issued_link_verifies_to_its_order() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();
    let secret = test_secret();

    let issued = links::issue_link(&conn, &order.id, &secret).unwrap();
    assert_eq!(issued.expires_at - issued.issued_at, LINK_TTL_SECS);

    let verified = links::verify_link(&conn, &issued.token, &secret).unwrap();
    assert_eq!(verified.id, order.id);
    assert_eq!(verified.payment_status, PaymentStatus::Pending);
}

#[test]
fn test_known_order_number_and_payment_id() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();
    conn.execute(
        "UPDATE orders SET order_number = 'O20240115103000123405' WHERE id = ?1",
        params![&order.id],
    )
    .unwrap();

    let secret = PaymentSecret::new("test-key").unwrap();
    let issued_at = now();
    let issued =
        links::issue_link_with_id(&conn, &order.id, &secret, "a1b2c3d4", issued_at).unwrap();

    let (payment_id, signature) = issued.token.split_once(':').unwrap();
    assert_eq!(payment_id, "a1b2c3d4");
    assert_eq!(signature.len(), 16);
    assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(
        signature,
        links::sign("O20240115103000123405", "a1b2c3d4", issued_at, &secret).unwrap()
    );

    let verified = links::verify_link(&conn, &issued.token, &secret).unwrap();
    assert_eq!(verified.id, order.id);
    assert_eq!(verified.order_number, "O20240115103000123405");
}

#[test]
fn test_wrong_secret_is_rejected() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();

    let issued = links::issue_link(&conn, &order.id, &test_secret()).unwrap();
    let other = PaymentSecret::new("another-key").unwrap();

    assert_verification(
        links::verify_link(&conn, &issued.token, &other),
        VerificationError::ExpiredOrInvalid,
    );
}

#[test]
fn test_forged_signature_with_valid_payment_id_is_rejected() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();
    let secret = test_secret();

    let issued = links::issue_link(&conn, &order.id, &secret).unwrap();
    let (payment_id, _) = issued.token.split_once(':').unwrap();
    let forged = format!("{}:{}", payment_id, "0".repeat(16));

    assert_verification(
        links::verify_link(&conn, &forged, &secret),
        VerificationError::ExpiredOrInvalid,
    );
}

#[test]
fn test_link_expires_after_thirty_minutes() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();
    let secret = test_secret();

    let issued = links::issue_link(&conn, &order.id, &secret).unwrap();

    assert!(links::verify_link_at(&conn, &issued.token, &secret, issued.issued_at + 29 * 60).is_ok());
    assert_verification(
        links::verify_link_at(&conn, &issued.token, &secret, issued.issued_at + 31 * 60),
        VerificationError::ExpiredOrInvalid,
    );
}

#[test]
fn test_link_for_stale_order_is_rejected() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();
    let secret = test_secret();

    // Order created an hour ago; a fresh link does not revive it.
    conn.execute(
        "UPDATE orders SET created_at = ?1 WHERE id = ?2",
        params![now() - 3600, &order.id],
    )
    .unwrap();
    let issued = links::issue_link(&conn, &order.id, &secret).unwrap();

    assert_verification(
        links::verify_link(&conn, &issued.token, &secret),
        VerificationError::ExpiredOrInvalid,
    );
}

#[test]
fn test_revoked_link_reports_already_used() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();
    let secret = test_secret();

    let issued = links::issue_link(&conn, &order.id, &secret).unwrap();
    assert!(queries::mark_payment_link_used(&conn, &order.id).unwrap());

    assert_verification(
        links::verify_link(&conn, &issued.token, &secret),
        VerificationError::AlreadyUsed,
    );
}

#[test]
fn test_malformed_tokens() {
    let (pool, _order) = setup();
    let conn = pool.get().unwrap();
    let secret = test_secret();

    for token in ["", "no-colon", "a:b:c", ":sig", "id:"] {
        assert_verification(
            links::verify_link(&conn, token, &secret),
            VerificationError::MalformedToken,
        );
    }
}

#[test]
fn test_unknown_payment_id_is_rejected() {
    let (pool, _order) = setup();
    let conn = pool.get().unwrap();

    assert_verification(
        links::verify_link(&conn, "deadbeef:0123456789abcdef", &test_secret()),
        VerificationError::ExpiredOrInvalid,
    );
}

#[test]
fn test_reissuing_invalidates_previous_link() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();
    let secret = test_secret();

    let first = links::issue_link_with_id(&conn, &order.id, &secret, "11111111", now()).unwrap();
    let second = links::issue_link_with_id(&conn, &order.id, &secret, "22222222", now()).unwrap();

    assert_verification(
        links::verify_link(&conn, &first.token, &secret),
        VerificationError::ExpiredOrInvalid,
    );
    assert!(links::verify_link(&conn, &second.token, &secret).is_ok());
}

#[test]
fn test_verification_does_not_modify_order() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();
    let secret = test_secret();

    let issued = links::issue_link(&conn, &order.id, &secret).unwrap();
    for _ in 0..3 {
        links::verify_link(&conn, &issued.token, &secret).unwrap();
    }

    let reloaded = queries::get_order_by_id(&conn, &order.id).unwrap().unwrap();
    assert_eq!(reloaded.payment_status, PaymentStatus::Pending);
    assert!(!reloaded.payment_link_used);
}

#[test]
fn test_cannot_issue_link_for_settled_order() {
    let (pool, order) = setup();
    let conn = pool.get().unwrap();
    assert!(queries::cancel_order(&conn, &order.id).unwrap());

    let err = links::issue_link(&conn, &order.id, &test_secret()).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn test_issue_link_for_missing_order() {
    let (pool, _order) = setup();
    let conn = pool.get().unwrap();

    let err = links::issue_link(&conn, "no-such-order", &test_secret()).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_consuming_link_pays_order_once() {
    let (pool, order) = setup();
    let mut conn = pool.get().unwrap();
    let secret = test_secret();

    let issued = links::issue_link(&conn, &order.id, &secret).unwrap();
    let paid = links::consume_payment_link(&mut conn, &issued.token, &secret).unwrap();

    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.payment_link_used);
    assert!(paid.completed_at.is_some());

    let product_id = order.product_id.clone().unwrap();
    let product = queries::get_product_by_id(&conn, &product_id).unwrap().unwrap();
    assert_eq!(product.purchase_count, 1);

    // The order is no longer pending, so the link no longer resolves.
    let replay = links::consume_payment_link(&mut conn, &issued.token, &secret);
    assert_verification(replay, VerificationError::ExpiredOrInvalid);

    let product = queries::get_product_by_id(&conn, &product_id).unwrap().unwrap();
    assert_eq!(product.purchase_count, 1);
}

#[test]
fn test_failed_consumption_leaves_order_pending() {
    let (pool, order) = setup();
    let mut conn = pool.get().unwrap();
    let secret = test_secret();

    let issued = links::issue_link(&conn, &order.id, &secret).unwrap();
    let other = PaymentSecret::new("another-key").unwrap();
    assert!(links::consume_payment_link(&mut conn, &issued.token, &other).is_err());

    let reloaded = queries::get_order_by_id(&conn, &order.id).unwrap().unwrap();
    assert_eq!(reloaded.payment_status, PaymentStatus::Pending);
    assert!(!reloaded.payment_link_used);
}

#[test]
fn test_concurrent_consumption_pays_exactly_once() {
    let (pool, _dir) = create_file_pool();
    let secret = test_secret();

    let (order, token) = {
        let conn = pool.get().unwrap();
        let product = create_test_product(&conn, "Contract Pack", 9900);
        let order = create_test_order(&conn, &product);
        let issued = links::issue_link(&conn, &order.id, &secret).unwrap();
        (order, issued.token)
    };

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let secret = secret.clone();
            let token = token.clone();
            std::thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                links::consume_payment_link(&mut conn, &token, &secret).is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);

    let conn = pool.get().unwrap();
    let product_id = order.product_id.unwrap();
    let product = queries::get_product_by_id(&conn, &product_id).unwrap().unwrap();
    assert_eq!(product.purchase_count, 1);
}
