//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use booking_store::InMemoryBookingStore;
use chrono::Duration;
use common::{BookingId, Clock, ManualClock, ScheduleId};
use domain::{Money, Schedule, SeatLayout};
use lifecycle::{
    BookingLifecycle, InMemoryNotificationDispatcher, InMemoryPaymentGateway,
    InMemoryScheduleCatalog, LifecycleConfig, RetryPolicy, Services,
};
use metrics_exporter_prometheus::PrometheusHandle;
use seat_inventory::SeatInventory;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    gateway: InMemoryPaymentGateway,
    schedule_id: ScheduleId,
}

fn setup() -> TestApp {
    let clock = Arc::new(ManualClock::default());
    let schedule = Schedule::new(
        ScheduleId::new(),
        SeatLayout::Fourteen,
        Money::new(500),
        clock.now() + Duration::hours(2),
    );
    let gateway = InMemoryPaymentGateway::new();
    let services = Services {
        inventory: Arc::new(SeatInventory::new(clock.clone())),
        gateway: Arc::new(gateway.clone()),
        notifier: Arc::new(InMemoryNotificationDispatcher::new()),
        catalog: Arc::new(InMemoryScheduleCatalog::with_schedules([schedule.clone()])),
        clock,
    };
    let config = LifecycleConfig {
        retry: RetryPolicy::no_retry(),
        ..LifecycleConfig::default()
    };
    let lifecycle = BookingLifecycle::new(InMemoryBookingStore::new(), services, config);
    let state = api::create_state(Arc::new(lifecycle));

    TestApp {
        app: api::create_app(state, get_metrics_handle()),
        gateway,
        schedule_id: schedule.schedule_id,
    }
}

impl TestApp {
    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn book(&self, customer: &str, seats: &[u16]) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/bookings",
            Some(json!({
                "scheduleId": self.schedule_id,
                "seats": seats,
                "customerId": customer,
                "paymentMethod": "mpesa",
                "payerContact": "254700000001"
            })),
        )
        .await
    }

    fn payment_ref(&self, booking: &Value) -> String {
        let booking_id: BookingId = booking["bookingId"].as_str().unwrap().parse().unwrap();
        self.gateway.charge_for(booking_id).unwrap().0
    }

    async fn callback(&self, external_ref: &str, status: &str, amount: i64) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/payments/callback",
            Some(json!({
                "externalRef": external_ref,
                "status": status,
                "amount": amount
            })),
        )
        .await
    }

    async fn availability(&self) -> Vec<u64> {
        let (status, json) = self
            .send(
                "GET",
                &format!("/schedules/{}/availability", self.schedule_id),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        json["available"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_u64().unwrap())
            .collect()
    }
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();
    let (status, json) = t.send("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_booking() {
    let t = setup();
    let (status, json) = t.book("cust-a", &[1, 2]).await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(json["bookingId"].as_str().is_some());
    assert!(json["reference"].as_str().is_some());
    assert_eq!(json["status"], "PendingPayment");
    assert_eq!(json["paymentStatus"], "Pending");
    assert_eq!(json["totalAmount"], 1000);
    assert_eq!(json["seats"], json!([1, 2]));
    assert!(json.get("paymentRef").is_none());
}

#[tokio::test]
async fn test_overlapping_seats_conflict() {
    let t = setup();
    let (status, _) = t.book("cust-a", &[1, 2]).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = t.book("cust-b", &[2, 3]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Seat 2 already taken, choose another");

    let free = t.availability().await;
    assert!(!free.contains(&1));
    assert!(free.contains(&3));
}

#[tokio::test]
async fn test_create_booking_validation() {
    let t = setup();

    let (status, _) = t.book("cust-a", &[15]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t.book("cust-a", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = t.book("cust-a", &[3, 3]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("repeat"));

    let (status, _) = t
        .send(
            "POST",
            "/bookings",
            Some(json!({
                "scheduleId": ScheduleId::new(),
                "seats": [1],
                "customerId": "cust-a",
                "paymentMethod": "mpesa"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Nothing was left held
    assert_eq!(t.availability().await.len(), 14);
}

#[tokio::test]
async fn test_get_booking_by_id_and_reference() {
    let t = setup();
    let (_, created) = t.book("cust-a", &[4]).await;
    let id = created["bookingId"].as_str().unwrap();
    let reference = created["reference"].as_str().unwrap();

    let (status, json) = t.send("GET", &format!("/bookings/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reference"], reference);

    let (status, json) = t
        .send("GET", &format!("/bookings/by-reference/{reference}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bookingId"], id);

    let (status, _) = t
        .send("GET", &format!("/bookings/{}", BookingId::new()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send("GET", "/bookings/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_callback_confirms_once() {
    let t = setup();
    let (_, created) = t.book("cust-a", &[1, 2]).await;
    let external_ref = t.payment_ref(&created);

    let (status, json) = t.callback(&external_ref, "success", 1000).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "applied");
    assert_eq!(json["status"], "Confirmed");

    let (status, json) = t.callback(&external_ref, "success", 1000).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "duplicate");

    let id = created["bookingId"].as_str().unwrap();
    let (_, booking) = t.send("GET", &format!("/bookings/{id}"), None).await;
    assert_eq!(booking["status"], "Confirmed");
    assert_eq!(booking["paymentStatus"], "Paid");

    let (_, history) = t
        .send("GET", &format!("/bookings/{id}/history"), None)
        .await;
    let events: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["eventType"].as_str().unwrap())
        .collect();
    assert_eq!(events, vec!["PaymentRequested", "PaymentConfirmed"]);

    let free = t.availability().await;
    assert!(!free.contains(&1) && !free.contains(&2));
}

#[tokio::test]
async fn test_callback_unknown_ref_is_not_found() {
    let t = setup();
    let (status, json) = t.callback("never-issued", "success", 500).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Unknown payment reference");
}

#[tokio::test]
async fn test_mismatched_payment_lands_in_reconciliation() {
    let t = setup();
    let (_, created) = t.book("cust-a", &[1, 2]).await;
    let external_ref = t.payment_ref(&created);

    let (status, json) = t.callback(&external_ref, "success", 900).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "reconciliation");

    let (status, cases) = t.send("GET", "/reconciliation", None).await;
    assert_eq!(status, StatusCode::OK);
    let cases = cases.as_array().unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0]["reason"], "payment_mismatch");
    assert_eq!(cases[0]["amount"], 900);
    assert_eq!(cases[0]["bookingId"], created["bookingId"]);
}

#[tokio::test]
async fn test_cancel_rules() {
    let t = setup();
    let (_, created) = t.book("cust-a", &[5, 6]).await;
    let id = created["bookingId"].as_str().unwrap();
    let uri = format!("/bookings/{id}/cancel");

    let (status, _) = t
        .send(
            "POST",
            &uri,
            Some(json!({
                "reason": "not mine",
                "actor": {"id": "cust-b", "role": "customer"}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let body = json!({
        "reason": "changed plans",
        "actor": {"id": "cust-a", "role": "customer"}
    });
    let (status, json) = t.send("POST", &uri, Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Cancelled");
    assert_eq!(t.availability().await.len(), 14);

    let (status, json) = t.send("POST", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Invalid transition"));
}

#[tokio::test]
async fn test_operator_cancel_of_paid_booking_refunds() {
    let t = setup();
    let (_, created) = t.book("cust-a", &[1, 2]).await;
    t.callback(&t.payment_ref(&created), "success", 1000).await;
    let id = created["bookingId"].as_str().unwrap();

    let (status, json) = t
        .send(
            "POST",
            &format!("/bookings/{id}/cancel"),
            Some(json!({
                "reason": "customer request",
                "actor": {"id": "clerk-1", "role": "operator"}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Refunded");
    assert_eq!(json["paymentStatus"], "Refunded");
    assert_eq!(t.gateway.refunds().len(), 1);
    assert_eq!(t.availability().await.len(), 14);
}

#[tokio::test]
async fn test_refund_gateway_outage_is_503() {
    let t = setup();
    let (_, created) = t.book("cust-a", &[1]).await;
    t.callback(&t.payment_ref(&created), "success", 500).await;
    t.gateway.set_unavailable_for(1);
    let id = created["bookingId"].as_str().unwrap();

    let (status, json) = t
        .send(
            "POST",
            &format!("/bookings/{id}/cancel"),
            Some(json!({
                "reason": "customer request",
                "actor": {"id": "clerk-1", "role": "operator"}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("try again"));

    let (_, booking) = t.send("GET", &format!("/bookings/{id}"), None).await;
    assert_eq!(booking["status"], "Confirmed");
}

#[tokio::test]
async fn test_complete_requires_confirmed() {
    let t = setup();
    let (_, created) = t.book("cust-a", &[1]).await;
    let id = created["bookingId"].as_str().unwrap();
    let uri = format!("/bookings/{id}/complete");

    let (status, _) = t.send("POST", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    t.callback(&t.payment_ref(&created), "success", 500).await;
    let (status, json) = t.send("POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Completed");
}

#[tokio::test]
async fn test_cash_payment() {
    let t = setup();
    let operator = json!({"id": "clerk-1", "role": "operator"});
    let (status, created) = t
        .send(
            "POST",
            "/bookings",
            Some(json!({
                "scheduleId": t.schedule_id,
                "seats": [7],
                "customerId": "walk-in-17",
                "paymentMethod": "cash",
                "actor": operator.clone()
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(t.gateway.charge_count(), 0);

    let uri = format!(
        "/bookings/{}/cash-payment",
        created["bookingId"].as_str().unwrap()
    );

    let (status, _) = t
        .send(
            "POST",
            &uri,
            Some(json!({"amount": 500, "actor": {"id": "walk-in-17", "role": "customer"}})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = t
        .send("POST", &uri, Some(json!({"amount": 500, "actor": operator.clone()})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "applied");
    assert_eq!(json["status"], "Confirmed");
}

#[tokio::test]
async fn test_availability_unknown_schedule() {
    let t = setup();
    let (status, _) = t
        .send(
            "GET",
            &format!("/schedules/{}/availability", ScheduleId::new()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    t.book("cust-a", &[1]).await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
