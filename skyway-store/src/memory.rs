use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use skyway_core::identity::normalize_email;
use skyway_core::models::{Booking, BookingStatus, Flight, SalesRow, User};
use skyway_core::repository::{BookingRepository, FlightRepository, RateLimiter, SessionStore, UserRepository};
use skyway_core::search::FlightSearchQuery;
use skyway_core::{CoreError, CoreResult};

#[derive(Default)]
struct MemoryState {
    flights: HashMap<Uuid, Flight>,
    bookings: HashMap<Uuid, Booking>,
    users: HashMap<Uuid, User>,
    user_emails: HashMap<String, Uuid>,
}

impl MemoryState {
    /// Flips the seat back to available; missing flights/seats are ignored.
    fn release_seat(&mut self, flight_id: Uuid, seat_number: &str) {
        if let Some(seat) = self.flights.get_mut(&flight_id).and_then(|f| f.seat_mut(seat_number)) {
            seat.is_available = true;
        }
    }
}

/// In-process backend. A single lock guards flights, bookings and users, so a
/// seat claim's check, flag flip and insert happen as one step.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlightRepository for MemoryStore {
    async fn create_flight(&self, flight: &Flight) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.flights.contains_key(&flight.id) {
            return Err(CoreError::Conflict(format!("Flight {} already exists", flight.id)));
        }
        state.flights.insert(flight.id, flight.clone());
        Ok(())
    }

    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        Ok(self.state.read().await.flights.get(&id).cloned())
    }

    async fn search_flights(&self, query: &FlightSearchQuery) -> CoreResult<Vec<Flight>> {
        let state = self.state.read().await;
        let mut flights: Vec<Flight> = state
            .flights
            .values()
            .filter(|f| query.matches(f))
            .cloned()
            .collect();
        flights.sort_by_key(|f| f.departure_time);
        Ok(flights)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn claim_seat(&self, booking: &Booking) -> CoreResult<Booking> {
        let mut state = self.state.write().await;

        let taken = state.bookings.values().any(|b| {
            b.flight_id == booking.flight_id && b.seat_number == booking.seat_number && b.status.holds_seat()
        });

        let flight = state
            .flights
            .get_mut(&booking.flight_id)
            .ok_or_else(|| CoreError::NotFound(format!("Flight {} not found", booking.flight_id)))?;
        let seat = flight.seat_mut(&booking.seat_number).ok_or_else(|| {
            CoreError::ValidationError(format!("Seat {} does not exist on this flight", booking.seat_number))
        })?;

        if !seat.is_available || taken {
            return Err(CoreError::Conflict(format!("Seat {} is already taken", booking.seat_number)));
        }

        seat.is_available = false;
        let mut stored = booking.clone();
        stored.seat_class = seat.seat_class;
        state.bookings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn confirm_booking(&self, id: Uuid, payment_reference: &str) -> CoreResult<Booking> {
        let mut state = self.state.write().await;
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Booking {} not found", id)))?;

        if booking.status != BookingStatus::Pending {
            return Err(CoreError::Conflict(format!("Booking {} is no longer pending", id)));
        }

        booking.status = BookingStatus::Confirmed;
        booking.payment_reference = Some(payment_reference.to_string());
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn cancel_booking(&self, id: Uuid) -> CoreResult<Booking> {
        let mut state = self.state.write().await;
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Booking {} not found", id)))?;

        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::Conflict(format!("Booking {} is already cancelled", id)));
        }

        booking.status = BookingStatus::Cancelled;
        booking.updated_at = Utc::now();
        let cancelled = booking.clone();

        state.release_seat(cancelled.flight_id, &cancelled.seat_number);
        Ok(cancelled)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_bookings_for_flight(&self, flight_id: Uuid) -> CoreResult<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.flight_id == flight_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn release_expired_holds(&self, cutoff: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let mut released = Vec::new();
        for booking in state.bookings.values_mut() {
            if booking.status == BookingStatus::Pending && booking.created_at < cutoff {
                booking.status = BookingStatus::Cancelled;
                booking.updated_at = now;
                released.push(booking.clone());
            }
        }

        for booking in &released {
            state.release_seat(booking.flight_id, &booking.seat_number);
        }
        Ok(released)
    }

    async fn sales_report(&self) -> CoreResult<Vec<SalesRow>> {
        let state = self.state.read().await;

        let mut rows: HashMap<Uuid, SalesRow> = HashMap::new();
        for booking in state.bookings.values().filter(|b| b.status == BookingStatus::Confirmed) {
            let flight_number = state
                .flights
                .get(&booking.flight_id)
                .map(|f| f.flight_number.clone())
                .unwrap_or_default();

            let row = rows.entry(booking.flight_id).or_insert_with(|| SalesRow {
                flight_id: booking.flight_id,
                flight_number,
                confirmed_bookings: 0,
                total_revenue: 0,
                currency: booking.price_currency.clone(),
            });
            row.confirmed_bookings += 1;
            row.total_revenue += i64::from(booking.price_amount);
        }

        let mut rows: Vec<SalesRow> = rows.into_values().collect();
        rows.sort_by(|a, b| {
            b.total_revenue
                .cmp(&a.total_revenue)
                .then_with(|| a.flight_number.cmp(&b.flight_number))
        });
        Ok(rows)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let email = normalize_email(&user.email);
        if state.user_emails.contains_key(&email) {
            return Err(CoreError::Conflict("Email is already registered".to_string()));
        }

        let mut stored = user.clone();
        stored.email = email.clone();
        state.user_emails.insert(email, stored.id);
        state.users.insert(stored.id, stored);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .user_emails
            .get(&normalize_email(email))
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }
}

/// Revoked token ids with their expiry.
#[derive(Default)]
pub struct MemorySessionStore {
    revoked: Mutex<HashMap<String, Instant>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn revoke(&self, jti: &str, ttl_seconds: u64) -> CoreResult<()> {
        let mut revoked = self.revoked.lock().await;
        let now = Instant::now();
        revoked.retain(|_, until| *until > now);
        revoked.insert(jti.to_string(), now + Duration::from_secs(ttl_seconds.max(1)));
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> CoreResult<bool> {
        let revoked = self.revoked.lock().await;
        Ok(revoked.get(jti).is_some_and(|until| *until > Instant::now()))
    }
}

/// Fixed window per key.
#[derive(Default)]
pub struct MemoryRateLimiter {
    /// Key to (window end, hits so far).
    windows: Mutex<HashMap<String, (Instant, i64)>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> CoreResult<bool> {
        let window = Duration::from_secs(window_seconds.max(1) as u64);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        // Drop every lapsed window so one-off keys do not pile up
        windows.retain(|_, (ends_at, _)| *ends_at > now);

        let ends_at = now
            .checked_add(window)
            .ok_or_else(|| CoreError::InternalError(format!("Rate limit window of {}s is too long", window_seconds)))?;
        let entry = windows.entry(key.to_string()).or_insert((ends_at, 0));
        entry.1 += 1;
        Ok(entry.1 <= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use skyway_core::models::{Role, Seat, SeatClass};
    use std::sync::Arc;

    fn flight_with_seats(numbers: &[&str]) -> Flight {
        let departure = Utc::now() + ChronoDuration::days(7);
        Flight {
            id: Uuid::new_v4(),
            flight_number: "SW42".to_string(),
            airline: "Skyway".to_string(),
            origin: "Seattle (SEA)".to_string(),
            destination: "Atlanta (ATL)".to_string(),
            departure_time: departure,
            arrival_time: departure + ChronoDuration::hours(5),
            price_amount: 19900,
            price_currency: "USD".to_string(),
            seats: numbers.iter().map(|n| Seat::new(*n, SeatClass::Economy)).collect(),
        }
    }

    async fn seeded(numbers: &[&str]) -> (MemoryStore, Flight) {
        let store = MemoryStore::new();
        let flight = flight_with_seats(numbers);
        store.create_flight(&flight).await.unwrap();
        (store, flight)
    }

    fn hold(flight: &Flight, seat_number: &str) -> Booking {
        let seat = flight.seat(seat_number).cloned().unwrap_or_else(|| Seat::new(seat_number, SeatClass::Economy));
        Booking::pending(Uuid::new_v4(), flight, &seat)
    }

    #[tokio::test]
    async fn test_claim_flips_seat_and_rejects_second_claim() {
        let (store, flight) = seeded(&["1", "2", "3"]).await;

        let booking = store.claim_seat(&hold(&flight, "2")).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);

        let stored = store.get_flight(flight.id).await.unwrap().unwrap();
        assert!(!stored.seat("2").unwrap().is_available);
        assert!(stored.seat("1").unwrap().is_available);

        let second = store.claim_seat(&hold(&flight, "2")).await;
        assert!(matches!(second, Err(CoreError::Conflict(_))));
        assert_eq!(store.list_bookings_for_flight(flight.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_unknown_flight_or_seat() {
        let (store, flight) = seeded(&["1"]).await;

        let missing_seat = store.claim_seat(&hold(&flight, "99")).await;
        assert!(matches!(missing_seat, Err(CoreError::ValidationError(_))));

        let other = flight_with_seats(&["1"]);
        let missing_flight = store.claim_seat(&hold(&other, "1")).await;
        assert!(matches!(missing_flight, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let (store, flight) = seeded(&["1", "2", "3"]).await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            let booking = hold(&flight, "1");
            handles.push(tokio::spawn(async move { store.claim_seat(&booking).await }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(CoreError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(conflicts, 31);
        assert_eq!(store.list_bookings_for_flight(flight.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_releases_seat() {
        let (store, flight) = seeded(&["1"]).await;
        let booking = store.claim_seat(&hold(&flight, "1")).await.unwrap();

        let cancelled = store.cancel_booking(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(store.get_flight(flight.id).await.unwrap().unwrap().seat("1").unwrap().is_available);

        assert!(matches!(store.cancel_booking(booking.id).await, Err(CoreError::Conflict(_))));

        // The seat can be claimed again
        assert!(store.claim_seat(&hold(&flight, "1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_confirm_only_from_pending() {
        let (store, flight) = seeded(&["1", "2"]).await;
        let booking = store.claim_seat(&hold(&flight, "1")).await.unwrap();

        let confirmed = store.confirm_booking(booking.id, "txn_abc").await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_reference.as_deref(), Some("txn_abc"));

        assert!(matches!(store.confirm_booking(booking.id, "txn_def").await, Err(CoreError::Conflict(_))));
        assert!(matches!(store.confirm_booking(Uuid::new_v4(), "txn").await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_expired_holds_are_released() {
        let (store, flight) = seeded(&["1", "2"]).await;

        let mut old = hold(&flight, "1");
        old.created_at = Utc::now() - ChronoDuration::minutes(30);
        let old = store.claim_seat(&old).await.unwrap();

        let mut paid = hold(&flight, "2");
        paid.created_at = Utc::now() - ChronoDuration::minutes(30);
        let paid = store.claim_seat(&paid).await.unwrap();
        store.confirm_booking(paid.id, "txn_1").await.unwrap();

        let released = store
            .release_expired_holds(Utc::now() - ChronoDuration::minutes(15))
            .await
            .unwrap();

        assert_eq!(released.len(), 1);
        assert_eq!(released[0].id, old.id);
        let stored = store.get_flight(flight.id).await.unwrap().unwrap();
        assert!(stored.seat("1").unwrap().is_available);
        assert!(!stored.seat("2").unwrap().is_available);
    }

    #[tokio::test]
    async fn test_sales_report_counts_confirmed_only() {
        let (store, flight) = seeded(&["1", "2", "3"]).await;
        for seat in ["1", "2"] {
            let b = store.claim_seat(&hold(&flight, seat)).await.unwrap();
            store.confirm_booking(b.id, "txn").await.unwrap();
        }
        store.claim_seat(&hold(&flight, "3")).await.unwrap();

        let report = store.sales_report().await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].confirmed_bookings, 2);
        assert_eq!(report[0].total_revenue, 2 * 19900);
        assert_eq!(report[0].flight_number, "SW42");
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        let user = User {
            id: Uuid::new_v4(),
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
        };
        store.create_user(&user).await.unwrap();

        let mut again = user.clone();
        again.id = Uuid::new_v4();
        again.email = " JANE@example.com".to_string();
        assert!(matches!(store.create_user(&again).await, Err(CoreError::Conflict(_))));

        let found = store.find_by_email("Jane@Example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_session_revocation() {
        let sessions = MemorySessionStore::new();
        assert!(!sessions.is_revoked("abc").await.unwrap());
        sessions.revoke("abc", 60).await.unwrap();
        assert!(sessions.is_revoked("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_rate_limit_window() {
        let limiter = MemoryRateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.check_rate_limit("ip", 3, 60).await.unwrap());
        }
        assert!(!limiter.check_rate_limit("ip", 3, 60).await.unwrap());
        assert!(limiter.check_rate_limit("other", 3, 60).await.unwrap());
    }

    #[tokio::test]
    async fn test_rate_limit_forgets_lapsed_windows() {
        let limiter = MemoryRateLimiter::new();
        for n in 0..50 {
            assert!(limiter.check_rate_limit(&format!("10.0.0.{}", n), 1, 1).await.unwrap());
        }
        assert!(!limiter.check_rate_limit("10.0.0.1", 1, 1).await.unwrap());
        assert_eq!(limiter.windows.lock().await.len(), 50);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(limiter.check_rate_limit("10.0.0.1", 1, 1).await.unwrap());
        assert_eq!(limiter.windows.lock().await.len(), 1);
    }
}
