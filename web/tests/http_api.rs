//! HTTP contract of the check-in service, driven through the router with
//! in-memory collaborators.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::Value;
use smart_parking_core::lock::spot_lock_key;
use smart_parking_core::types::{BookingId, BookingStatus, LotId, RequesterId, SpaceId};
use smart_parking_runtime::{
    CheckInConfig, CheckInEnvironment, CheckInOrchestrator, CheckOutService, IngressQueue,
    IngressReceiver,
};
use smart_parking_testing::{InMemoryMutex, InMemoryReservationStore, test_clock};
use smart_parking_web::{AppState, EventHub, USER_ID_HEADER, WsEvent, router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// ============================================================================
// Test Fixtures
// ============================================================================

struct Service {
    store: Arc<InMemoryReservationStore>,
    mutex: Arc<InMemoryMutex>,
    events: EventHub,
    orchestrator: CheckInOrchestrator,
    state: AppState,
    lot: LotId,
}

impl Service {
    fn new(queue_capacity: usize) -> (Self, IngressReceiver) {
        let store = Arc::new(InMemoryReservationStore::new());
        let mutex = Arc::new(InMemoryMutex::new());
        let events = EventHub::new(16);
        let clock = Arc::new(test_clock());
        let config = CheckInConfig {
            queue_capacity,
            ..CheckInConfig::default()
        };
        let env = CheckInEnvironment::new(
            store.clone(),
            mutex.clone(),
            Arc::new(events.clone()),
            clock.clone(),
            &config,
        );
        let checkout = CheckOutService::from_environment(&env);
        let orchestrator = CheckInOrchestrator::new(env, config.clone());
        let (ingress, receiver) = IngressQueue::bounded(config.queue_capacity, clock);
        let state = AppState::new(
            ingress,
            checkout,
            orchestrator.gate().clone(),
            events.clone(),
        );
        let lot = store.add_lot("North");
        (
            Self {
                store,
                mutex,
                events,
                orchestrator,
                state,
                lot,
            },
            receiver,
        )
    }

    fn app(&self) -> Router {
        router(self.state.clone())
    }

    fn booking(&self, status: BookingStatus) -> (RequesterId, BookingId, SpaceId) {
        let space = self.store.add_space(self.lot, "A-01", "1");
        let requester = RequesterId::new();
        let booking = self.store.add_booking(requester, self.lot, space, status);
        (requester, booking, space)
    }
}

fn post(path: &str, requester: Option<RequesterId>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(path);
    if let Some(requester) = requester {
        builder = builder.header(USER_ID_HEADER, requester.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

async fn json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Check-in
// ============================================================================

#[tokio::test]
async fn check_in_is_accepted_and_buffered() {
    let (service, mut receiver) = Service::new(8);
    let (requester, booking, _) = service.booking(BookingStatus::Pending);

    let response = service
        .app()
        .oneshot(post(
            &format!("/api/reservations/{booking}/checkin"),
            Some(requester),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json(response).await;
    assert_eq!(body["message"], "Check-in request accepted and being processed");

    let envelope = receiver.recv().await.unwrap();
    assert_eq!(body["request_id"], envelope.receipt.request_id.to_string());
    assert_eq!(envelope.request.booking_id, booking);
    assert_eq!(envelope.request.requester_id, requester);
}

#[tokio::test]
async fn check_in_without_requester_is_unauthorized() {
    let (service, _receiver) = Service::new(8);

    let response = service
        .app()
        .oneshot(post(
            &format!("/api/reservations/{}/checkin", BookingId::new()),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(response).await["code"], "UNAUTHORIZED");
    assert_eq!(service.state.ingress.depth(), 0);
}

#[tokio::test]
async fn check_in_with_full_queue_is_unavailable() {
    let (service, _receiver) = Service::new(1);
    let (requester, booking, _) = service.booking(BookingStatus::Pending);
    let path = format!("/api/reservations/{booking}/checkin");

    let first = service
        .app()
        .oneshot(post(&path, Some(requester)))
        .await
        .unwrap();
    let second = service
        .app()
        .oneshot(post(&path, Some(requester)))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::ACCEPTED);
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(second).await["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn accepted_check_in_is_processed_and_broadcast() {
    let (service, receiver) = Service::new(8);
    let (requester, booking, space) = service.booking(BookingStatus::Pending);
    let mut events = service.events.subscribe();
    let consumer = service.orchestrator.spawn(receiver);

    let response = service
        .app()
        .oneshot(post(
            &format!("/api/reservations/{booking}/checkin"),
            Some(requester),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let report = consumer.shutdown(Duration::from_secs(5)).await;
    assert_eq!(report.committed, 1);
    assert_eq!(
        service.store.booking(booking).unwrap().status,
        BookingStatus::Active
    );

    let mut saw_update = false;
    while let Ok(event) = events.try_recv() {
        if let WsEvent::ParkingUpdate(update) = event {
            assert_eq!(update.space_id, space);
            assert!(update.is_occupied);
            saw_update = true;
        }
    }
    assert!(saw_update, "no parking update was broadcast");
}

// ============================================================================
// Check-out
// ============================================================================

#[tokio::test]
async fn check_out_frees_the_space() {
    let (service, _receiver) = Service::new(8);
    let (requester, booking, space) = service.booking(BookingStatus::Active);
    service.store.seed_occupied(space, true);

    let response = service
        .app()
        .oneshot(post(
            &format!("/api/reservations/{booking}/checkout"),
            Some(requester),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["message"], "Check-out completed");
    assert_eq!(body["space_id"], space.to_string());
    assert_eq!(
        service.store.booking(booking).unwrap().status,
        BookingStatus::Completed
    );
    assert!(!service.store.space(space).unwrap().occupied);
    assert_eq!(service.mutex.held_count(), 0);
}

#[tokio::test]
async fn check_out_of_unknown_booking_is_not_found() {
    let (service, _receiver) = Service::new(8);

    let response = service
        .app()
        .oneshot(post(
            &format!("/api/reservations/{}/checkout", BookingId::new()),
            Some(RequesterId::new()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn check_out_of_a_pending_booking_conflicts() {
    let (service, _receiver) = Service::new(8);
    let (requester, booking, space) = service.booking(BookingStatus::Pending);
    service.store.seed_occupied(space, true);

    let response = service
        .app()
        .oneshot(post(
            &format!("/api/reservations/{booking}/checkout"),
            Some(requester),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json(response).await["code"], "CONFLICT");
    assert_eq!(
        service.store.booking(booking).unwrap().status,
        BookingStatus::Pending
    );
    assert!(service.store.space(space).unwrap().occupied);
    assert_eq!(service.mutex.acquire_attempts(), 0);
}

#[tokio::test]
async fn check_out_during_check_in_conflicts() {
    let (service, _receiver) = Service::new(8);
    let (requester, booking, space) = service.booking(BookingStatus::Active);
    let _check_in = service
        .mutex
        .hold(&spot_lock_key(space), Duration::from_secs(10));

    let response = service
        .app()
        .oneshot(post(
            &format!("/api/reservations/{booking}/checkout"),
            Some(requester),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json(response).await["code"], "CONFLICT");
    assert_eq!(
        service.store.booking(booking).unwrap().status,
        BookingStatus::Active
    );
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn readiness_reports_pipeline_load() {
    let (service, _receiver) = Service::new(8);

    let response = service
        .app()
        .oneshot(
            Request::builder()
                .uri("/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["queue_capacity"], 8);
    assert_eq!(body["gate_capacity"], 50);
    assert_eq!(body["in_flight"], 0);
}

#[tokio::test]
async fn readiness_fails_once_draining() {
    let (service, receiver) = Service::new(8);
    drop(receiver);

    let response = service
        .app()
        .oneshot(
            Request::builder()
                .uri("/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(response).await["status"], "draining");
}

#[tokio::test]
async fn liveness_is_plain_ok() {
    let (service, _receiver) = Service::new(8);

    let response = service
        .app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ok");
}
