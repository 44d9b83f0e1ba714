use std::sync::Arc;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;

use skyway_core::booking::BookingService;
use skyway_core::models::Booking;
use skyway_core::payment::MockPaymentGateway;
use skyway_core::repository::{
    BookingRepository, EventPublisher, FlightRepository, RateLimiter, SessionStore, UserRepository,
};
use skyway_shared::models::events::{SeatEvent, SeatEventKind};
use skyway_store::app_config::{AuthConfig, BusinessRules};
use skyway_store::booking_repo::PostgresBookingRepository;
use skyway_store::events::{TOPIC_SEATS_CLAIMED, TOPIC_SEATS_RELEASED};
use skyway_store::flight_repo::PostgresFlightRepository;
use skyway_store::user_repo::PostgresUserRepository;
use skyway_store::{DbClient, LogEventPublisher, MemoryRateLimiter, MemorySessionStore, MemoryStore};

use crate::metrics::Metrics;

/// The three data repositories, backed by one store.
#[derive(Clone)]
pub struct Repositories {
    pub flights: Arc<dyn FlightRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            flights: store.clone(),
            bookings: store.clone(),
            users: store,
        }
    }

    pub fn postgres(db: &DbClient) -> Self {
        Self {
            flights: Arc::new(PostgresFlightRepository::new(db.pool.clone())),
            bookings: Arc::new(PostgresBookingRepository::new(db.pool.clone())),
            users: Arc::new(PostgresUserRepository::new(db.pool.clone())),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub flights: Arc<dyn FlightRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub users: Arc<dyn UserRepository>,
    pub booking_service: Arc<BookingService>,
    pub sessions: Arc<dyn SessionStore>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub events: Arc<dyn EventPublisher>,
    pub sse_tx: broadcast::Sender<SeatEvent>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        sessions: Arc<dyn SessionStore>,
        rate_limiter: Arc<dyn RateLimiter>,
        events: Arc<dyn EventPublisher>,
        auth: AuthConfig,
        business_rules: BusinessRules,
    ) -> Result<Self, prometheus::Error> {
        let payments = Arc::new(MockPaymentGateway::new(business_rules.payment_success_rate));
        let booking_service = BookingService::new(repos.flights.clone(), repos.bookings.clone(), payments);
        let (sse_tx, _) = broadcast::channel(100);

        Ok(Self {
            flights: repos.flights,
            bookings: repos.bookings,
            users: repos.users,
            booking_service: Arc::new(booking_service),
            sessions,
            rate_limiter,
            events,
            sse_tx,
            metrics: Arc::new(Metrics::new()?),
            auth,
            business_rules,
        })
    }

    /// Everything in process: memory store, memory sessions and rate limits,
    /// events to the log only.
    pub fn in_memory(auth: AuthConfig, business_rules: BusinessRules) -> Result<Self, prometheus::Error> {
        Self::new(
            Repositories::in_memory(),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryRateLimiter::new()),
            Arc::new(LogEventPublisher),
            auth,
            business_rules,
        )
    }

    /// Tells live seat-map subscribers and the event bus that a seat changed hands.
    pub async fn seat_changed(&self, kind: SeatEventKind, booking: &Booking) {
        let event = SeatEvent {
            kind,
            flight_id: booking.flight_id,
            seat_number: booking.seat_number.clone(),
            booking_id: booking.id,
            timestamp: Utc::now().timestamp(),
        };

        // No subscribers is fine
        let _ = self.sse_tx.send(event.clone());

        let topic = match kind {
            SeatEventKind::SeatClaimed => TOPIC_SEATS_CLAIMED,
            SeatEventKind::SeatReleased => TOPIC_SEATS_RELEASED,
        };
        self.publish(topic, &booking.flight_id.to_string(), &event).await;
    }

    /// Best effort: a broker outage must not fail the request that caused the event.
    pub async fn publish<T: Serialize>(&self, topic: &str, key: &str, payload: &T) {
        let payload = match serde_json::to_string(payload) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("Failed to serialize event for {}: {}", topic, e);
                return;
            }
        };

        if let Err(e) = self.events.publish(topic, key, &payload).await {
            tracing::warn!("Event publish to {} failed: {}", topic, e);
        }
    }
}
