//! Scriptable in-memory gateway for tests.
//!
//! Responses are queued per operation and consumed in order; an empty
//! queue yields a `RequestFailed` so a missing script shows up as a test
//! failure instead of a hang.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    GatewayError, IssuedToken, OrderCreated, OrderRequest, PaymentGateway, StatusSnapshot,
};

#[derive(Default)]
pub struct MockGateway {
    tokens: Mutex<VecDeque<Result<IssuedToken, GatewayError>>>,
    orders: Mutex<VecDeque<Result<OrderCreated, GatewayError>>>,
    statuses: Mutex<VecDeque<Result<StatusSnapshot, GatewayError>>>,
    token_calls: AtomicUsize,
    order_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_token(&self, token: IssuedToken) {
        self.tokens.lock().unwrap().push_back(Ok(token));
    }

    pub fn push_token_error(&self, err: GatewayError) {
        self.tokens.lock().unwrap().push_back(Err(err));
    }

    pub fn push_order(&self, order: OrderCreated) {
        self.orders.lock().unwrap().push_back(Ok(order));
    }

    pub fn push_order_error(&self, err: GatewayError) {
        self.orders.lock().unwrap().push_back(Err(err));
    }

    pub fn push_status(&self, status: &str) {
        self.statuses.lock().unwrap().push_back(Ok(StatusSnapshot {
            status: status.to_string(),
            raw: serde_json::json!({ "status": status }),
        }));
    }

    pub fn push_status_error(&self, err: GatewayError) {
        self.statuses.lock().unwrap().push_back(Err(err));
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn order_calls(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

/// A token that stays valid well past any test's 5-minute freshness margin.
pub fn long_lived_token(access_token: &str) -> IssuedToken {
    IssuedToken {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        expires_in: 3600,
    }
}

fn exhausted(op: &str) -> GatewayError {
    GatewayError::RequestFailed {
        status: 599,
        body: format!("mock gateway: no scripted {op} response"),
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    async fn fetch_token(&self) -> Result<IssuedToken, GatewayError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("token")))
    }

    async fn create_order(
        &self,
        _request: &OrderRequest,
        _token: &str,
    ) -> Result<OrderCreated, GatewayError> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("order")))
    }

    async fn fetch_status(
        &self,
        _order_id: &str,
        _token: &str,
    ) -> Result<StatusSnapshot, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("status")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_are_consumed_in_order() {
        let mock = MockGateway::new();
        mock.push_status("PENDING");
        mock.push_status("SUCCESS");

        let first = mock.fetch_status("order-1", "tok").await.unwrap();
        let second = mock.fetch_status("order-1", "tok").await.unwrap();
        assert_eq!(first.status, "PENDING");
        assert_eq!(second.status, "SUCCESS");
        assert_eq!(mock.status_calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_queue_fails_instead_of_hanging() {
        let mock = MockGateway::new();

        let err = mock.fetch_token().await.unwrap_err();
        match err {
            GatewayError::RequestFailed { status, .. } => assert_eq!(status, 599),
            other => panic!("unexpected error: {other}"),
        }
    }
}
