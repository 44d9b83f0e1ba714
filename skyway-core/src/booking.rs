use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::access::{Capability, Principal};
use crate::models::{Booking, BookingStatus, SalesRow};
use crate::payment::{CardDetails, PaymentAdapter, PaymentIntent, PaymentStatus};
use crate::repository::{BookingRepository, FlightRepository};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub booking: Booking,
    pub payment: PaymentIntent,
}

/// Seat selection, booking lifecycle and payment on top of the repositories.
pub struct BookingService {
    flights: Arc<dyn FlightRepository>,
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentAdapter>,
}

impl BookingService {
    pub fn new(
        flights: Arc<dyn FlightRepository>,
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentAdapter>,
    ) -> Self {
        Self { flights, bookings, payments }
    }

    /// Claims a seat for the caller and records a pending booking.
    ///
    /// The availability check here only short-circuits the obvious case; the
    /// repository re-checks and flips the seat atomically, so a concurrent
    /// claim that slips past this point still ends in `Conflict`.
    pub async fn claim_seat(
        &self,
        principal: &Principal,
        flight_id: Uuid,
        seat_number: &str,
    ) -> CoreResult<Booking> {
        principal.require(Capability::BookSeat)?;

        let seat_number = seat_number.trim();
        if seat_number.is_empty() {
            return Err(CoreError::ValidationError("Seat number is required".to_string()));
        }

        let flight = self
            .flights
            .get_flight(flight_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Flight {} not found", flight_id)))?;

        let seat = flight.seat(seat_number).ok_or_else(|| {
            CoreError::ValidationError(format!("Seat {} does not exist on flight {}", seat_number, flight.flight_number))
        })?;

        if !seat.is_available {
            return Err(CoreError::Conflict(format!("Seat {} is already taken", seat_number)));
        }

        let booking = Booking::pending(principal.user_id, &flight, seat);
        let booking = self.bookings.claim_seat(&booking).await?;

        tracing::info!(
            "Seat {} on flight {} claimed by user {} (booking {})",
            booking.seat_number, flight.flight_number, principal.user_id, booking.id
        );
        Ok(booking)
    }

    /// Bookings the caller may not see are reported as missing.
    pub async fn get_booking(&self, principal: &Principal, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .filter(|b| principal.can_access_booking(b))
            .ok_or_else(|| CoreError::NotFound(format!("Booking {} not found", booking_id)))?;
        Ok(booking)
    }

    pub async fn list_bookings(&self, principal: &Principal) -> CoreResult<Vec<Booking>> {
        principal.require(Capability::ManageOwnBookings)?;
        self.bookings.list_bookings_for_user(principal.user_id).await
    }

    pub async fn cancel_booking(&self, principal: &Principal, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self.get_booking(principal, booking_id).await?;
        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::Conflict(format!("Booking {} is already cancelled", booking_id)));
        }

        let cancelled = self.bookings.cancel_booking(booking.id).await?;
        tracing::info!("Booking {} cancelled, seat {} released", cancelled.id, cancelled.seat_number);
        Ok(cancelled)
    }

    /// Charges the booking's fare. A declined charge leaves the booking pending.
    pub async fn pay_booking(
        &self,
        principal: &Principal,
        booking_id: Uuid,
        card: &CardDetails,
    ) -> CoreResult<PaymentReceipt> {
        let booking = self.get_booking(principal, booking_id).await?;
        if booking.user_id != principal.user_id {
            return Err(CoreError::Forbidden("Only the booking owner can pay for it".to_string()));
        }
        if booking.status != BookingStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "Booking {} is {} and cannot be paid",
                booking.id, booking.status
            )));
        }

        let payment = self
            .payments
            .process_payment(booking.id, booking.price_amount, &booking.price_currency, card)
            .await?;

        match (payment.status, payment.transaction_id.as_deref()) {
            (PaymentStatus::Succeeded, Some(reference)) => {
                let booking = self.bookings.confirm_booking(booking.id, reference).await?;
                tracing::info!("Booking {} confirmed with transaction {}", booking.id, reference);
                Ok(PaymentReceipt { booking, payment })
            }
            (PaymentStatus::Succeeded, None) => Err(CoreError::InternalError(
                "Payment succeeded without a transaction id".to_string(),
            )),
            (PaymentStatus::Declined, _) => {
                tracing::warn!("Payment declined for booking {}", booking.id);
                Err(CoreError::PaymentDeclined("The card was declined, please try again".to_string()))
            }
        }
    }

    /// Cancels holds older than `hold` and returns them.
    pub async fn release_expired_holds(&self, hold: Duration) -> CoreResult<Vec<Booking>> {
        let cutoff = Utc::now()
            .checked_sub_signed(hold)
            .ok_or_else(|| CoreError::ValidationError("Booking hold is out of range".to_string()))?;
        let released = self.bookings.release_expired_holds(cutoff).await?;
        if !released.is_empty() {
            tracing::info!("Released {} expired seat holds", released.len());
        }
        Ok(released)
    }

    pub async fn sales_report(&self, principal: &Principal) -> CoreResult<Vec<SalesRow>> {
        principal.require(Capability::ViewSales)?;
        self.bookings.sales_report().await
    }
}
