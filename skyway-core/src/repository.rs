use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Booking, Flight, SalesRow, User};
use crate::search::FlightSearchQuery;
use crate::CoreResult;

/// Repository trait for flight data access
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn create_flight(&self, flight: &Flight) -> CoreResult<()>;

    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>>;

    /// Matching flights ordered by departure time.
    async fn search_flights(&self, query: &FlightSearchQuery) -> CoreResult<Vec<Flight>>;
}

/// Repository trait for bookings. Every method that touches a seat flag
/// changes the seat and the booking in one atomic unit.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Claims `booking.seat_number` on `booking.flight_id` and stores the booking.
    ///
    /// Fails with `NotFound` for an unknown flight, `ValidationError` for a seat
    /// that is not on the flight and `Conflict` when the seat is already taken.
    async fn claim_seat(&self, booking: &Booking) -> CoreResult<Booking>;

    /// Moves a pending booking to confirmed. `Conflict` if it is not pending.
    async fn confirm_booking(&self, id: Uuid, payment_reference: &str) -> CoreResult<Booking>;

    /// Cancels a booking and releases its seat. `Conflict` if already cancelled.
    async fn cancel_booking(&self, id: Uuid) -> CoreResult<Booking>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    /// Newest first.
    async fn list_bookings_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>>;

    async fn list_bookings_for_flight(&self, flight_id: Uuid) -> CoreResult<Vec<Booking>>;

    /// Cancels pending bookings created before `cutoff`, releasing their seats.
    async fn release_expired_holds(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<Booking>>;

    /// Confirmed bookings per flight, highest revenue first.
    async fn sales_report(&self) -> CoreResult<Vec<SalesRow>>;
}

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `Conflict` when the (normalized) email is already registered.
    async fn create_user(&self, user: &User) -> CoreResult<()>;

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>>;

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;
}

/// Tracks revoked access tokens by their `jti`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn revoke(&self, jti: &str, ttl_seconds: u64) -> CoreResult<()>;

    async fn is_revoked(&self, jti: &str) -> CoreResult<bool>;
}

/// Fixed-window request counter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one hit against `key`; `false` once `limit` is exceeded in the window.
    async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> CoreResult<bool>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()>;
}
