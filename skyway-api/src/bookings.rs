use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use skyway_core::access::Capability;
use skyway_core::booking::PaymentReceipt;
use skyway_core::models::Booking;
use skyway_core::payment::CardDetails;
use skyway_core::CoreError;
use skyway_shared::models::events::{BookingCancelledEvent, BookingConfirmedEvent, SeatEventKind};
use skyway_store::events::{TOPIC_BOOKINGS_CANCELLED, TOPIC_BOOKINGS_CONFIRMED};

use crate::error::AppError;
use crate::middleware::auth::{auth_middleware, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub flight_id: Uuid,
    pub seat_number: String,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking).delete(cancel_booking))
        .route("/v1/bookings/{id}/pay", post(pay_booking))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

/// Shared by `POST /v1/bookings` and `POST /v1/flights/{id}/seats/select`.
pub(crate) async fn claim_seat(
    state: &AppState,
    auth: &AuthUser,
    flight_id: Uuid,
    seat_number: &str,
) -> Result<Booking, AppError> {
    auth.require(Capability::BookSeat)?;

    match state.booking_service.claim_seat(&auth.principal, flight_id, seat_number).await {
        Ok(booking) => {
            state.metrics.record_seat_claim("claimed");
            state.seat_changed(SeatEventKind::SeatClaimed, &booking).await;
            Ok(booking)
        }
        Err(e) => {
            let outcome = if matches!(e, CoreError::Conflict(_)) { "conflict" } else { "rejected" };
            state.metrics.record_seat_claim(outcome);
            Err(e.into())
        }
    }
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = claim_seat(&state, &auth, req.flight_id, &req.seat_number).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state.booking_service.list_bookings(&auth.principal).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.booking_service.get_booking(&auth.principal, id).await?;
    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.booking_service.cancel_booking(&auth.principal, id).await?;

    state.seat_changed(SeatEventKind::SeatReleased, &booking).await;
    let event = BookingCancelledEvent {
        booking_id: booking.id,
        flight_id: booking.flight_id,
        seat_number: booking.seat_number.clone(),
        reason: "cancelled_by_user".to_string(),
        timestamp: Utc::now().timestamp(),
    };
    state.publish(TOPIC_BOOKINGS_CANCELLED, &booking.id.to_string(), &event).await;

    Ok(Json(booking))
}

async fn pay_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(auth): Extension<AuthUser>,
    Json(card): Json<CardDetails>,
) -> Result<Json<PaymentReceipt>, AppError> {
    let receipt = match state.booking_service.pay_booking(&auth.principal, id, &card).await {
        Ok(receipt) => receipt,
        Err(e) => {
            match &e {
                CoreError::PaymentDeclined(_) => state.metrics.record_payment("declined"),
                CoreError::ValidationError(_) => state.metrics.record_payment("invalid"),
                _ => {}
            }
            return Err(e.into());
        }
    };
    state.metrics.record_payment("succeeded");

    let booking = &receipt.booking;
    let event = BookingConfirmedEvent {
        booking_id: booking.id,
        flight_id: booking.flight_id,
        user_id: booking.user_id,
        seat_number: booking.seat_number.clone(),
        amount: receipt.payment.amount,
        currency: receipt.payment.currency.clone(),
        transaction_id: booking.payment_reference.clone().unwrap_or_default(),
        timestamp: Utc::now().timestamp(),
    };
    state.publish(TOPIC_BOOKINGS_CONFIRMED, &booking.id.to_string(), &event).await;

    Ok(Json(receipt))
}
