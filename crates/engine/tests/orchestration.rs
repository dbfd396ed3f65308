use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use serde_json::json;

use engine::{
    CreateOrderCmd, Engine, EngineError, InvoiceStatus, MoneyCents, ReconcileCmd, TokenSource,
    TransactionStatus,
};
use gateway::mock::{MockGateway, long_lived_token};
use gateway::{GatewayError, OrderCreated};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, Arc<MockGateway>, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password) VALUES (?, ?)",
        vec!["alice".into(), "password".into()],
    ))
    .await
    .unwrap();
    let mock = Arc::new(MockGateway::new());
    let engine = Engine::builder()
        .database(db.clone())
        .gateway(mock.clone())
        .build()
        .await
        .unwrap();
    (engine, mock, db)
}

async fn seed_invoice(db: &DatabaseConnection, id: &str, amount_minor: i64, status: &str) {
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO invoices (id, user_id, vendor_id, amount_minor, status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
        vec![
            id.into(),
            "alice".into(),
            "vendor-1".into(),
            amount_minor.into(),
            status.into(),
            Utc::now().into(),
        ],
    ))
    .await
    .unwrap();
}

fn scripted_order(order_id: &str) -> OrderCreated {
    OrderCreated {
        order_id: order_id.to_string(),
        order_token: format!("{order_id}-token"),
        raw: json!({ "orderId": order_id, "state": "PENDING" }),
    }
}

fn order_cmd(invoice_id: &str, amount_minor: i64) -> CreateOrderCmd {
    CreateOrderCmd {
        invoice_id: invoice_id.to_string(),
        amount: MoneyCents::new(amount_minor),
        user_id: "alice".to_string(),
    }
}

#[tokio::test]
async fn token_is_fetched_once_then_served_from_cache() {
    let (engine, mock, _db) = engine_with_db().await;
    mock.push_token(long_lived_token("tok-1"));

    let (first, source) = engine.get_token().await.unwrap();
    assert_eq!(source, TokenSource::Fresh);
    assert_eq!(first.access_token, "tok-1");

    let (second, source) = engine.get_token().await.unwrap();
    assert_eq!(source, TokenSource::Cached);
    assert_eq!(second.access_token, "tok-1");
    assert_eq!(mock.token_calls(), 1);
}

#[tokio::test]
async fn token_expiring_within_margin_triggers_refresh() {
    let (engine, mock, db) = engine_with_db().await;

    // Active token that expires in one minute, inside the five-minute margin.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO auth_tokens (access_token, token_type, expires_at, is_active, created_at) \
         VALUES (?, ?, ?, ?, ?)",
        vec![
            "stale".into(),
            "Bearer".into(),
            (Utc::now() + Duration::seconds(60)).into(),
            true.into(),
            Utc::now().into(),
        ],
    ))
    .await
    .unwrap();

    mock.push_token(long_lived_token("tok-2"));
    let (token, source) = engine.get_token().await.unwrap();
    assert_eq!(source, TokenSource::Fresh);
    assert_eq!(token.access_token, "tok-2");
    assert_eq!(mock.token_calls(), 1);

    // The stale row was deactivated, so the fresh one serves from cache now.
    let (token, source) = engine.get_token().await.unwrap();
    assert_eq!(source, TokenSource::Cached);
    assert_eq!(token.access_token, "tok-2");
}

#[tokio::test]
async fn token_fetch_failure_maps_to_auth_unavailable() {
    let (engine, mock, _db) = engine_with_db().await;
    mock.push_token_error(GatewayError::RequestFailed {
        status: 500,
        body: "upstream down".to_string(),
    });

    let err = engine.get_token().await.unwrap_err();
    assert!(matches!(err, EngineError::AuthUnavailable(_)));
}

#[tokio::test]
async fn create_order_initiates_transaction_and_invoice() {
    let (engine, mock, db) = engine_with_db().await;
    seed_invoice(&db, "inv-1", 10_000, "pending").await;
    mock.push_token(long_lived_token("tok"));
    mock.push_order(scripted_order("order-1"));

    let placed = engine.create_order(order_cmd("inv-1", 10_000)).await.unwrap();

    assert_eq!(placed.order_id, "order-1");
    assert_eq!(placed.order_token, "order-1-token");
    assert!(placed.merchant_ref.starts_with("INV_"));
    assert_eq!(placed.amount, MoneyCents::new(10_000));
    assert_eq!(placed.fee, MoneyCents::new(200));
    assert_eq!(placed.rewards, MoneyCents::new(150));

    let invoice = engine.invoice("inv-1", "alice").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::PaymentInitiated);
    assert_eq!(invoice.transaction_id, Some(placed.transaction_id));

    let tx = engine.transaction_by_reference("order-1").await.unwrap();
    assert_eq!(tx.id, placed.transaction_id);
    assert_eq!(tx.status, TransactionStatus::Initiated);
    assert_eq!(tx.gateway_status.as_deref(), Some("CREATED"));
    assert_eq!(tx.merchant_ref, placed.merchant_ref);
    assert_eq!(tx.status_check_count, 0);
}

#[tokio::test]
async fn create_order_rejects_amount_mismatch_before_gateway() {
    let (engine, mock, db) = engine_with_db().await;
    seed_invoice(&db, "inv-1", 10_000, "pending").await;

    let err = engine
        .create_order(order_cmd("inv-1", 9_999))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AmountMismatch(_)));
    assert_eq!(mock.token_calls(), 0);
    assert_eq!(mock.order_calls(), 0);

    let invoice = engine.invoice("inv-1", "alice").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
}

#[tokio::test]
async fn create_order_requires_a_pending_invoice() {
    let (engine, mock, db) = engine_with_db().await;
    seed_invoice(&db, "inv-1", 10_000, "paid").await;

    let err = engine
        .create_order(order_cmd("inv-1", 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert_eq!(mock.order_calls(), 0);
}

#[tokio::test]
async fn create_order_ignores_other_users_invoices() {
    let (engine, _mock, db) = engine_with_db().await;
    seed_invoice(&db, "inv-1", 10_000, "pending").await;

    let err = engine
        .create_order(CreateOrderCmd {
            invoice_id: "inv-1".to_string(),
            amount: MoneyCents::new(10_000),
            user_id: "mallory".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn create_order_gateway_failure_leaves_invoice_pending() {
    let (engine, mock, db) = engine_with_db().await;
    seed_invoice(&db, "inv-1", 10_000, "pending").await;
    mock.push_token(long_lived_token("tok"));
    mock.push_order_error(GatewayError::RequestFailed {
        status: 400,
        body: "bad request".to_string(),
    });

    let err = engine
        .create_order(order_cmd("inv-1", 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Gateway(_)));

    let invoice = engine.invoice("inv-1", "alice").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.transaction_id, None);
}

#[tokio::test]
async fn persist_failure_after_gateway_order_carries_the_order_id() {
    let (engine, mock, db) = engine_with_db().await;
    seed_invoice(&db, "inv-1", 10_000, "pending").await;
    mock.push_token(long_lived_token("tok"));
    mock.push_order(scripted_order("order-1"));

    // The gateway order goes through but the local write cannot land.
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(backend, "DROP TABLE transactions"))
        .await
        .unwrap();

    let err = engine
        .create_order(order_cmd("inv-1", 10_000))
        .await
        .unwrap_err();
    match err {
        EngineError::PersistAfterGatewaySuccess { order_id, .. } => {
            assert_eq!(order_id, "order-1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.order_calls(), 1);
}

async fn placed_order(
    engine: &Engine,
    mock: &MockGateway,
    db: &DatabaseConnection,
) -> engine::OrderPlaced {
    seed_invoice(db, "inv-1", 10_000, "pending").await;
    mock.push_token(long_lived_token("tok"));
    mock.push_order(scripted_order("order-1"));
    engine.create_order(order_cmd("inv-1", 10_000)).await.unwrap()
}

#[tokio::test]
async fn poll_success_marks_invoice_paid_and_is_idempotent() {
    let (engine, mock, db) = engine_with_db().await;
    let placed = placed_order(&engine, &mock, &db).await;

    mock.push_status("SUCCESS");
    let outcome = engine
        .reconcile(ReconcileCmd::poll(&placed.order_id))
        .await
        .unwrap();
    assert!(outcome.verified);
    assert_eq!(outcome.status, TransactionStatus::Success);
    assert_eq!(outcome.transaction_id, placed.transaction_id);

    let invoice = engine.invoice("inv-1", "alice").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert!(invoice.paid_at.is_some());

    let tx = engine.transaction_by_reference(&placed.order_id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Success);
    assert!(tx.completed_at.is_some());

    // A repeated poll returns the stored outcome without touching the gateway.
    let again = engine
        .reconcile(ReconcileCmd::poll(&placed.order_id))
        .await
        .unwrap();
    assert!(again.verified);
    assert_eq!(again.status, TransactionStatus::Success);
    assert_eq!(mock.status_calls(), 1);
}

#[tokio::test]
async fn poll_failure_records_reason_and_keeps_invoice_unpaid() {
    let (engine, mock, db) = engine_with_db().await;
    let placed = placed_order(&engine, &mock, &db).await;

    mock.push_status("FAILURE");
    let outcome = engine
        .reconcile(ReconcileCmd::poll(&placed.order_id))
        .await
        .unwrap();
    assert!(!outcome.verified);
    assert_eq!(outcome.status, TransactionStatus::Failure);

    let tx = engine.transaction_by_reference(&placed.order_id).await.unwrap();
    assert_eq!(tx.failure_reason.as_deref(), Some("payment failed"));

    let invoice = engine.invoice("inv-1", "alice").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::PaymentInitiated);
    assert!(invoice.paid_at.is_none());
}

#[tokio::test]
async fn poll_with_nonterminal_status_only_bumps_the_counter() {
    let (engine, mock, db) = engine_with_db().await;
    let placed = placed_order(&engine, &mock, &db).await;

    mock.push_status("PROCESSING");
    let outcome = engine
        .reconcile(ReconcileCmd::poll(&placed.order_id))
        .await
        .unwrap();
    assert!(!outcome.verified);
    assert_eq!(outcome.status, TransactionStatus::Pending);

    let tx = engine.transaction_by_reference(&placed.order_id).await.unwrap();
    assert_eq!(tx.status_check_count, 1);
    assert_eq!(tx.gateway_status.as_deref(), Some("PROCESSING"));

    mock.push_status("PROCESSING");
    engine
        .reconcile(ReconcileCmd::poll(&placed.order_id))
        .await
        .unwrap();
    let tx = engine.transaction_by_reference(&placed.order_id).await.unwrap();
    assert_eq!(tx.status_check_count, 2);

    let invoice = engine.invoice("inv-1", "alice").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::PaymentInitiated);
}

#[tokio::test]
async fn webhook_success_needs_no_gateway_round_trip() {
    let (engine, mock, db) = engine_with_db().await;
    let placed = placed_order(&engine, &mock, &db).await;
    let calls_after_order = mock.token_calls();

    let outcome = engine
        .reconcile(ReconcileCmd::pushed(
            &placed.merchant_ref,
            json!({ "code": "PAYMENT_SUCCESS", "merchantOrderId": placed.merchant_ref }),
        ))
        .await
        .unwrap();
    assert!(outcome.verified);
    assert_eq!(outcome.status, TransactionStatus::Success);

    assert_eq!(mock.status_calls(), 0);
    assert_eq!(mock.token_calls(), calls_after_order);

    let invoice = engine.invoice("inv-1", "alice").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn webhook_failure_message_becomes_failure_reason() {
    let (engine, mock, db) = engine_with_db().await;
    let placed = placed_order(&engine, &mock, &db).await;

    let outcome = engine
        .reconcile(ReconcileCmd::pushed(
            &placed.merchant_ref,
            json!({ "status": "FAILURE", "message": "insufficient funds" }),
        ))
        .await
        .unwrap();
    assert!(!outcome.verified);

    let tx = engine
        .transaction_by_reference(&placed.merchant_ref)
        .await
        .unwrap();
    assert_eq!(tx.failure_reason.as_deref(), Some("insufficient funds"));
}

#[tokio::test]
async fn conflicting_terminal_delivery_returns_stored_outcome() {
    let (engine, mock, db) = engine_with_db().await;
    let placed = placed_order(&engine, &mock, &db).await;

    engine
        .reconcile(ReconcileCmd::pushed(
            &placed.merchant_ref,
            json!({ "code": "PAYMENT_SUCCESS" }),
        ))
        .await
        .unwrap();

    // A late contradictory webhook does not rewrite history.
    let outcome = engine
        .reconcile(ReconcileCmd::pushed(
            &placed.merchant_ref,
            json!({ "status": "FAILURE" }),
        ))
        .await
        .unwrap();
    assert!(outcome.verified);
    assert_eq!(outcome.status, TransactionStatus::Success);

    let invoice = engine.invoice("inv-1", "alice").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn reconcile_unknown_reference_is_not_found() {
    let (engine, _mock, _db) = engine_with_db().await;

    let err = engine
        .reconcile(ReconcileCmd::poll("no-such-order"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
